use std::collections::HashMap;

use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{BrushConfig, DisplayRect, MaskSurface, Point, Size, to_native};
use crate::components::history::HistoryStack;
use crate::components::text_overlay::{TextId, TextOverlayStore};
use crate::io::{ExportError, LoadError, decode_upload, export_filename};
use crate::ops::export::{self, TextStyle};
use crate::ops::inpaint::{composite_erase, erased_pixel_count};
use crate::ops::text::FontBook;
use crate::settings::EditorSettings;

/// Shown when processing is requested before anything was drawn.
pub const EMPTY_MASK_MESSAGE: &str = "Please add a drawing before processing.";

/// Stable identifier of an uploaded image, independent of its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(Uuid);

/// One uploaded image. The original pixels never change.
#[derive(Debug)]
pub struct ImageSlot {
    pub id: SlotId,
    /// Source file name, used for the export filename.
    pub name: String,
    pub original: RgbaImage,
}

impl ImageSlot {
    pub fn width(&self) -> u32 {
        self.original.width()
    }

    pub fn height(&self) -> u32 {
        self.original.height()
    }
}

/// Mask plus its undo history, created on first use of a slot.
#[derive(Debug)]
pub struct MaskEditor {
    pub mask: MaskSurface,
    pub history: HistoryStack,
}

/// Receives user-facing messages (failed preconditions).
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

impl<F: FnMut(&str)> Notifier for F {
    fn notify(&mut self, message: &str) {
        self(message)
    }
}

/// Notifier for hosts without a notification surface. The refusal itself
/// is already in the session log, so the message is dropped.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&mut self, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    NoActiveImage,
    EmptyMask,
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::NoActiveImage => write!(f, "no image is selected"),
            ProcessError::EmptyMask => write!(f, "the mask is empty"),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Final raster plus the name it should be saved under.
#[derive(Debug)]
pub struct ExportOutput {
    pub image: RgbaImage,
    pub filename: String,
}

/// Whole editing session: uploaded images, one mask editor per image, the
/// active image, its processed result and the text laid over it.
pub struct Session {
    slots: Vec<ImageSlot>,
    editors: HashMap<SlotId, MaskEditor>,
    active: Option<usize>,
    display: Option<DisplayRect>,
    processed: Option<RgbaImage>,
    texts: TextOverlayStore,
    settings: EditorSettings,
    notifier: Box<dyn Notifier>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl Session {
    pub fn new(settings: EditorSettings) -> Self {
        Self::with_notifier(settings, Box::new(SilentNotifier))
    }

    pub fn with_notifier(settings: EditorSettings, notifier: Box<dyn Notifier>) -> Self {
        Self {
            slots: Vec::new(),
            editors: HashMap::new(),
            active: None,
            display: None,
            processed: None,
            texts: TextOverlayStore::new(),
            settings,
            notifier,
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn brush(&self) -> BrushConfig {
        self.settings.brush()
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.settings.brush_size = size;
    }

    pub fn set_brush_color(&mut self, color: [u8; 3]) {
        self.settings.brush_color = color;
    }

    // ========================================================================
    // IMAGE SLOTS
    // ========================================================================

    /// Decode each `(name, bytes)` source into a new slot, in order.
    ///
    /// Failed sources get an `Err` in their position and create nothing.
    /// If at least one source succeeded the first new slot becomes active
    /// and the processed raster is dropped.
    pub fn upload<I, N, B>(&mut self, sources: I) -> Vec<Result<SlotId, LoadError>>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: AsRef<[u8]>,
    {
        let first_new = self.slots.len();
        let mut results = Vec::new();
        for (name, bytes) in sources {
            let name = name.into();
            match decode_upload(&name, bytes.as_ref()) {
                Ok(original) => {
                    let id = SlotId(Uuid::new_v4());
                    crate::log_info!(
                        "Uploaded '{}' ({}x{})",
                        name,
                        original.width(),
                        original.height()
                    );
                    self.slots.push(ImageSlot { id, name, original });
                    results.push(Ok(id));
                }
                Err(e) => {
                    crate::log_err!("Upload rejected: {}", e);
                    results.push(Err(e));
                }
            }
        }
        if self.slots.len() > first_new {
            self.active = Some(first_new);
            self.processed = None;
        }
        results
    }

    pub fn slots(&self) -> &[ImageSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_slot(&self) -> Option<&ImageSlot> {
        self.active.and_then(|i| self.slots.get(i))
    }

    /// Make `index` active. Out of range or already active: no-op.
    /// Other slots keep their masks and histories.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.slots.len() || self.active == Some(index) {
            return false;
        }
        if let Some(editor) = self.active_editor_if_created() {
            editor.mask.end_stroke();
        }
        self.active = Some(index);
        self.processed = None;
        true
    }

    pub fn can_previous(&self) -> bool {
        matches!(self.active, Some(i) if i > 0)
    }

    pub fn can_next(&self) -> bool {
        matches!(self.active, Some(i) if i + 1 < self.slots.len())
    }

    pub fn previous(&mut self) -> bool {
        match self.active {
            Some(i) if i > 0 => self.select(i - 1),
            _ => false,
        }
    }

    pub fn next(&mut self) -> bool {
        match self.active {
            Some(i) => self.select(i + 1),
            None => false,
        }
    }

    /// Drop a slot together with its mask and history.
    pub fn remove(&mut self, id: SlotId) -> Option<ImageSlot> {
        let idx = self.slots.iter().position(|s| s.id == id)?;
        let slot = self.slots.remove(idx);
        self.editors.remove(&id);
        match self.active {
            Some(a) if a == idx => {
                self.active = if self.slots.is_empty() { None } else { Some(idx.min(self.slots.len() - 1)) };
                self.processed = None;
            }
            Some(a) if a > idx => self.active = Some(a - 1),
            _ => {}
        }
        crate::log_info!("Removed '{}'", slot.name);
        Some(slot)
    }

    // ========================================================================
    // MASK EDITING
    // ========================================================================

    /// Where the active image is shown on screen.
    pub fn set_display_rect(&mut self, rect: DisplayRect) {
        self.display = Some(rect);
    }

    /// The configured display rect, or the active image shown 1:1.
    pub fn display_rect(&self) -> Option<DisplayRect> {
        self.display.or_else(|| {
            self.active_slot()
                .map(|s| DisplayRect::fit_width(s.width() as f32, s.width(), s.height()))
        })
    }

    fn active_editor_if_created(&mut self) -> Option<&mut MaskEditor> {
        let id = self.active_slot()?.id;
        self.editors.get_mut(&id)
    }

    /// Mask editor of the active slot, created on first access.
    pub fn active_editor(&mut self) -> Option<&mut MaskEditor> {
        let slot = self.active.and_then(|i| self.slots.get(i))?;
        let settings = &self.settings;
        Some(self.editors.entry(slot.id).or_insert_with(|| MaskEditor {
            mask: MaskSurface::new(slot.width(), slot.height()),
            history: settings.new_history(),
        }))
    }

    /// Active mask, if anything has touched it yet.
    pub fn mask(&self) -> Option<&MaskSurface> {
        let id = self.active_slot()?.id;
        self.editors.get(&id).map(|e| &e.mask)
    }

    /// Mask tinted with the brush colour at the preview alpha, for display.
    pub fn mask_preview(&self) -> Option<RgbaImage> {
        self.mask().map(|m| m.preview(self.settings.preview_alpha))
    }

    /// Pointer-down in display space. Snapshots the mask before anything is
    /// painted, so one undo reverts exactly this stroke.
    pub fn begin_stroke(&mut self, display_point: Point) -> bool {
        let Some(rect) = self.display_rect() else { return false };
        let brush = self.brush();
        let Some(slot) = self.active_slot() else { return false };
        let (w, h) = (slot.width(), slot.height());
        let at = to_native(display_point, rect, w, h);
        let width = brush.native_width(rect, w);

        let Some(editor) = self.active_editor() else { return false };
        editor.history.push(editor.mask.snapshot());
        editor.mask.begin_stroke(at, width, brush.color);
        true
    }

    /// Pointer-move in display space; ignored outside a stroke.
    pub fn extend_stroke(&mut self, display_point: Point) {
        let Some(rect) = self.display_rect() else { return };
        let Some(slot) = self.active_slot() else { return };
        let to = to_native(display_point, rect, slot.width(), slot.height());
        if let Some(editor) = self.active_editor_if_created() {
            editor.mask.extend_stroke(to);
        }
    }

    pub fn end_stroke(&mut self) {
        if let Some(editor) = self.active_editor_if_created() {
            if editor.mask.is_stroking() {
                editor.mask.end_stroke();
                crate::log_info!("Stroke committed ({} undo steps)", editor.history.len());
            }
        }
    }

    /// Revert the most recent stroke of the active slot. `false` when there
    /// is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(editor) = self.active_editor_if_created() else { return false };
        let undone = editor.history.undo(&mut editor.mask);
        if undone {
            crate::log_info!("Undo ({} steps left)", editor.history.len());
        }
        undone
    }

    pub fn can_undo(&self) -> bool {
        self.active_slot()
            .and_then(|s| self.editors.get(&s.id))
            .is_some_and(|e| e.history.can_undo())
    }

    /// Wipe the active mask and its history.
    pub fn clear(&mut self) {
        if let Some(editor) = self.active_editor_if_created() {
            editor.mask.clear();
            editor.history.reset();
        }
    }

    /// Paint an external coverage image into the active mask as one undoable
    /// step.
    pub fn import_mask(&mut self, coverage: &RgbaImage) -> bool {
        let color = self.settings.brush_color;
        let Some(editor) = self.active_editor() else { return false };
        if coverage.dimensions() != (editor.mask.width(), editor.mask.height()) {
            crate::log_warn!(
                "Mask is {}x{}, image is {}x{}; aligning to top-left",
                coverage.width(),
                coverage.height(),
                editor.mask.width(),
                editor.mask.height()
            );
        }
        editor.history.push(editor.mask.snapshot());
        editor.mask.paint_coverage(coverage, color);
        true
    }

    // ========================================================================
    // PROCESS & EXPORT
    // ========================================================================

    /// Erase the masked pixels of the active image.
    ///
    /// An empty mask is refused with exactly one notification and nothing
    /// changes. On success the slot's history is reset and all text is
    /// discarded.
    pub fn process(&mut self) -> Result<&RgbaImage, ProcessError> {
        let Some(slot) = self.active.and_then(|i| self.slots.get(i)) else {
            crate::log_warn!("Process refused: no image is selected");
            return Err(ProcessError::NoActiveImage);
        };
        let editor = match self.editors.get_mut(&slot.id) {
            Some(editor) if !editor.mask.is_empty() => editor,
            _ => {
                crate::log_warn!("Process refused for '{}': mask is empty", slot.name);
                self.notifier.notify(EMPTY_MASK_MESSAGE);
                return Err(ProcessError::EmptyMask);
            }
        };

        editor.mask.end_stroke();
        let processed = composite_erase(&slot.original, &editor.mask);
        editor.history.reset();
        self.texts.clear();
        crate::log_info!(
            "Processed '{}' ({}x{}, {} px erased)",
            slot.name,
            processed.width(),
            processed.height(),
            erased_pixel_count(&editor.mask)
        );
        let processed = self.processed.insert(processed);
        Ok(&*processed)
    }

    pub fn processed(&self) -> Option<&RgbaImage> {
        self.processed.as_ref()
    }

    pub fn texts(&self) -> &TextOverlayStore {
        &self.texts
    }

    pub fn texts_mut(&mut self) -> &mut TextOverlayStore {
        &mut self.texts
    }

    /// Add a text entity with the configured defaults; it becomes active.
    pub fn add_text(&mut self) -> TextId {
        let defaults = self.settings.text_defaults();
        self.texts.add(&defaults)
    }

    pub fn text_style(&self) -> TextStyle {
        self.settings.text_style()
    }

    /// Burn the text into the processed raster. `displayed` is the on-screen
    /// size of the result view the text was positioned in.
    pub fn export(&self, displayed: Size, fonts: &mut FontBook) -> Result<ExportOutput, ExportError> {
        self.render_export(displayed, fonts)
            .inspect_err(|e| {
                crate::log_err!("Export failed: {}", e);
            })
    }

    fn render_export(&self, displayed: Size, fonts: &mut FontBook) -> Result<ExportOutput, ExportError> {
        let processed = self.processed.as_ref().ok_or(ExportError::NothingProcessed)?;
        let source_name = self.active_slot().map_or("image", |s| s.name.as_str());
        let image = export::render(processed, self.texts.entities(), displayed, fonts, &self.text_style())?;
        let filename = export_filename(&self.settings.export_prefix, source_name, self.settings.export_format);
        crate::log_info!("Exported {} ({} text entities)", filename, self.texts.len());
        Ok(ExportOutput { image, filename })
    }
}
