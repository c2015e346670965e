// ============================================================================
// Export renderer: burn text overlays into the processed raster
// ============================================================================

use image::RgbaImage;

use crate::canvas::Size;
use crate::components::text_overlay::TextEntity;
use crate::io::ExportError;
use crate::ops::text::{FontBook, draw_text_line};

/// Fixed styling applied to every exported text line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub color: [u8; 3],
    /// Line advance as a multiple of the font size.
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: [0x1F, 0x29, 0x37],
            line_height: 1.2,
        }
    }
}

/// One line of one entity, positioned in native raster pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct LinePlacement<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub family: &'a str,
}

/// `(final / displayed)` per axis. A zero displayed extent maps 1:1.
pub fn export_scale(final_w: u32, final_h: u32, displayed: Size) -> (f32, f32) {
    let sx = if displayed.width > 0.0 { final_w as f32 / displayed.width } else { 1.0 };
    let sy = if displayed.height > 0.0 { final_h as f32 / displayed.height } else { 1.0 };
    (sx, sy)
}

/// Where every line lands, in creation order (later entities draw on top).
pub fn layout_entities<'a>(
    texts: &'a [TextEntity],
    final_w: u32,
    final_h: u32,
    displayed: Size,
    style: &TextStyle,
) -> Vec<LinePlacement<'a>> {
    let (sx, sy) = export_scale(final_w, final_h, displayed);
    let mut lines = Vec::new();
    for entity in texts {
        let advance = entity.font_size * style.line_height * sy;
        for (i, line) in entity.content.split('\n').enumerate() {
            lines.push(LinePlacement {
                text: line.trim_end_matches('\r'),
                x: entity.x * sx,
                y: entity.y * sy + i as f32 * advance,
                font_size: entity.font_size,
                family: &entity.font_family,
            });
        }
    }
    lines
}

/// Base layer is `processed`; each text line is drawn bold, left-aligned,
/// top-baseline at its projected position. No wrapping is done.
pub fn render(
    processed: &RgbaImage,
    texts: &[TextEntity],
    displayed: Size,
    fonts: &mut FontBook,
    style: &TextStyle,
) -> Result<RgbaImage, ExportError> {
    let mut out = processed.clone();
    let (w, h) = out.dimensions();

    for line in layout_entities(texts, w, h, displayed, style) {
        if line.text.is_empty() {
            continue;
        }
        let face = fonts
            .bold(line.family)
            .ok_or_else(|| ExportError::FontUnavailable(line.family.to_string()))?;
        draw_text_line(&mut out, face, line.text, line.x, line.y, line.font_size, style.color);
    }

    Ok(out)
}
