// Opens the process-wide session log, so it lives in its own test binary.

use std::io::Cursor;

use image::RgbaImage;
use wipe::ops::text::FontBook;
use wipe::{EditorSettings, ExportError, ProcessError, Session, Size, logger};

#[test]
fn refusals_and_failed_exports_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("wipe.log");
    logger::init_at(&path).unwrap();

    let mut session = Session::with_notifier(EditorSettings::default(), Box::new(|_: &str| {}));
    assert_eq!(session.process().unwrap_err(), ProcessError::NoActiveImage);

    let mut png = Cursor::new(Vec::new());
    RgbaImage::new(8, 8).write_to(&mut png, image::ImageOutputFormat::Png).unwrap();
    session.upload([("a.png", png.into_inner())]);
    assert_eq!(session.process().unwrap_err(), ProcessError::EmptyMask);
    assert!(matches!(
        session.export(Size::new(8.0, 8.0), &mut FontBook::empty()),
        Err(ExportError::NothingProcessed)
    ));

    let log = std::fs::read_to_string(&path).unwrap();
    assert!(log.starts_with("=== Wipe session started"));
    assert!(log.contains("[INFO] Uploaded 'a.png' (8x8)"));
    assert!(log.contains("[WARN] Process refused: no image is selected"));
    assert!(log.contains("[WARN] Process refused for 'a.png': mask is empty"));
    assert!(log.contains("[ERROR] Export failed: nothing has been processed yet"));
}
