use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use image::{Rgba, RgbaImage};
use wipe::components::text_overlay::TextUpdate;
use wipe::io::{ExportFormat, TiffCompression, decode_upload, encode};
use wipe::ops::text::FontBook;
use wipe::project::EMPTY_MASK_MESSAGE;
use wipe::{DisplayRect, EditorSettings, LoadError, Point, ProcessError, Session, Size};

fn checker(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 { Rgba([240, 240, 240, 255]) } else { Rgba([30, 60, 90, 255]) }
    })
}

fn png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

fn recording_session(settings: EditorSettings) -> (Session, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let session = Session::with_notifier(settings, Box::new(move |m: &str| sink.borrow_mut().push(m.to_owned())));
    (session, log)
}

fn stroke(session: &mut Session, points: &[(f32, f32)]) {
    let (first, rest) = points.split_first().unwrap();
    assert!(session.begin_stroke(Point::new(first.0, first.1)));
    for &(x, y) in rest {
        session.extend_stroke(Point::new(x, y));
    }
    session.end_stroke();
}

#[test]
fn undo_restores_exact_state_after_previous_stroke() {
    let (mut session, _) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(64, 32)))]);
    session.set_display_rect(DisplayRect::fit_width(32.0, 64, 32));
    session.set_brush_size(3.0);

    stroke(&mut session, &[(2.0, 2.0), (20.0, 4.0), (28.0, 12.0)]);
    let after_a = session.mask().unwrap().snapshot();
    stroke(&mut session, &[(5.0, 14.0), (30.0, 14.0)]);
    assert_ne!(session.mask().unwrap().snapshot(), after_a);

    assert!(session.undo());
    assert_eq!(session.mask().unwrap().snapshot(), after_a);
}

#[test]
fn processing_an_untouched_mask_notifies_once() {
    let (mut session, log) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(16, 16)))]);

    assert_eq!(session.process().unwrap_err(), ProcessError::EmptyMask);
    assert!(session.processed().is_none());
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0], EMPTY_MASK_MESSAGE);

    // A stroke that was undone leaves the mask empty again.
    stroke(&mut session, &[(1.0, 1.0), (8.0, 8.0)]);
    session.undo();
    assert!(session.process().is_err());
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn cleared_mask_is_refused_too() {
    let (mut session, log) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(16, 16)))]);
    stroke(&mut session, &[(1.0, 1.0), (8.0, 8.0)]);
    session.clear();
    session.clear();
    assert!(session.mask().unwrap().is_empty());
    assert!(!session.can_undo());
    assert_eq!(session.process().unwrap_err(), ProcessError::EmptyMask);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn processed_pixels_outside_the_stroke_match_the_source() {
    let source = checker(32, 32);
    let (mut session, _) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&source))]);
    session.set_brush_size(4.0);
    stroke(&mut session, &[(0.0, 16.0), (32.0, 16.0)]);

    let mask = session.mask().unwrap().clone();
    let processed = session.process().unwrap().clone();
    for (x, y, p) in processed.enumerate_pixels() {
        if mask.coverage(x, y) != 0 {
            assert_eq!(p.0, [0, 0, 0, 0]);
        } else {
            assert_eq!(p, source.get_pixel(x, y));
        }
    }
    assert!(processed.pixels().any(|p| p[3] == 0));
}

#[test]
fn finalization_clears_history_and_text() {
    let (mut session, _) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(16, 16)))]);
    stroke(&mut session, &[(2.0, 2.0), (6.0, 6.0)]);
    stroke(&mut session, &[(10.0, 2.0), (12.0, 12.0)]);
    session.add_text();
    session.add_text();
    assert_eq!(session.texts().len(), 2);

    session.process().unwrap();
    assert!(!session.can_undo());
    assert!(session.texts().is_empty());
    assert!(!session.undo());
}

#[test]
fn corrupt_upload_does_not_disturb_other_slots() {
    let (mut session, _) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(8, 8)))]);
    stroke(&mut session, &[(1.0, 1.0), (6.0, 6.0)]);

    let mut truncated = png(&checker(8, 8));
    truncated.truncate(20);
    let results = session.upload([("b.png", truncated), ("c.txt", b"plain text".to_vec())]);
    assert!(results.iter().all(|r| matches!(r, Err(LoadError::Decode { .. }))));
    assert_eq!(session.len(), 1);
    assert_eq!(session.active_index(), Some(0));
    assert!(session.can_undo());
}

#[test]
fn per_slot_history_survives_switching() {
    let (mut session, _) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(16, 16))), ("b.png", png(&checker(24, 12)))]);
    stroke(&mut session, &[(1.0, 1.0), (5.0, 5.0)]);
    let a_mask = session.mask().unwrap().snapshot();

    session.next();
    assert_eq!(session.mask().map(|m| (m.width(), m.height())), None);
    stroke(&mut session, &[(1.0, 1.0), (20.0, 10.0)]);
    assert_eq!(session.mask().map(|m| (m.width(), m.height())), Some((24, 12)));

    session.previous();
    assert_eq!(session.mask().unwrap().snapshot(), a_mask);
    assert!(session.undo());
    assert!(session.mask().unwrap().is_empty());

    session.next();
    assert!(session.can_undo());
}

#[test]
fn export_keeps_processed_pixels_and_names_file() {
    let settings = EditorSettings { export_format: ExportFormat::Tiff, ..EditorSettings::default() };
    let (mut session, _) = recording_session(settings);
    session.upload([("holiday.jpeg", png(&checker(20, 20)))]);
    stroke(&mut session, &[(0.0, 0.0), (20.0, 20.0)]);
    let processed = session.process().unwrap().clone();

    let out = session.export(Size::new(10.0, 10.0), &mut FontBook::empty()).unwrap();
    assert_eq!(out.filename, "wiped_holiday.tiff");

    let bytes = encode(&out.image, ExportFormat::Tiff, TiffCompression::Deflate).unwrap();
    assert_eq!(decode_upload(&out.filename, &bytes).unwrap(), processed);
}

#[test]
fn text_edits_flow_into_store() {
    let (mut session, _) = recording_session(EditorSettings::default());
    session.upload([("a.png", png(&checker(8, 8)))]);
    let id = session.add_text();
    assert_eq!(session.texts().active_id(), Some(id));

    let texts = session.texts_mut();
    texts.begin_edit(id).unwrap().input("Sale");
    texts.commit_edit();
    texts.update(id, TextUpdate::font_family("Georgia"));
    let t = session.texts().get(id).unwrap();
    assert_eq!(t.content, "Sale");
    assert_eq!(t.font_family, "Georgia");
    assert_eq!((t.x, t.y, t.font_size), (20.0, 20.0, 48.0));
}
