use image::{Rgba, RgbaImage};
use rayon::prelude::*;

// ============================================================================
// COORDINATE MAPPER
// ============================================================================

/// A point in either display space (on-screen pixels) or native pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Width/height pair, used for overlay containers and text boxes.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Where the editing surface currently sits on screen.
///
/// The surface is always shown at a uniform aspect scale, so only `width`
/// participates in the scale factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// A rect at the origin that shows an image of `native_w × native_h`
    /// scaled to `display_width`, keeping its aspect ratio.
    pub fn fit_width(display_width: f32, native_w: u32, native_h: u32) -> Self {
        let s = to_display_scale(display_width, native_w);
        Self::new(0.0, 0.0, display_width, native_h as f32 * s)
    }
}

/// Display → native scale factor `nativeWidth / displayWidth`.
/// A degenerate (non-positive) display width maps 1:1.
pub fn native_scale(display_width: f32, native_width: u32) -> f32 {
    if display_width > 0.0 {
        native_width as f32 / display_width
    } else {
        1.0
    }
}

/// Native → display scale factor `displayWidth / nativeWidth`.
pub fn to_display_scale(display_width: f32, native_width: u32) -> f32 {
    if native_width > 0 {
        display_width / native_width as f32
    } else {
        1.0
    }
}

/// Project a length stored in native pixels back into display pixels.
pub fn to_display_length(native_length: f32, display_width: f32, native_width: u32) -> f32 {
    native_length * to_display_scale(display_width, native_width)
}

/// Pointer position on screen → native pixel position.
///
/// Points outside the rect are mapped too (a stroke that leaves the surface
/// keeps its geometry); the rasterizer clips.
pub fn to_native(display: Point, rect: DisplayRect, native_w: u32, _native_h: u32) -> Point {
    let s = native_scale(rect.width, native_w);
    Point {
        x: (display.x - rect.left) * s,
        y: (display.y - rect.top) * s,
    }
}

/// Inverse of [`to_native`].
pub fn to_display(native: Point, rect: DisplayRect, native_w: u32) -> Point {
    let s = to_display_scale(rect.width, native_w);
    Point {
        x: native.x * s + rect.left,
        y: native.y * s + rect.top,
    }
}

// ============================================================================
// BRUSH
// ============================================================================

/// Process-wide brush, as authored by the brush controls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushConfig {
    /// Stroke width in *display* pixels; scaled into native pixels per stroke.
    pub size: f32,
    /// Opaque RGB stroke colour.
    pub color: [u8; 3],
    /// Alpha used only when previewing the mask on screen.
    pub preview_alpha: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            size: 20.0,
            color: [0x00, 0xFF, 0x00],
            preview_alpha: 0.5,
        }
    }
}

impl BrushConfig {
    /// Stroke width in native pixels for a surface shown at `rect`.
    pub fn native_width(&self, rect: DisplayRect, native_w: u32) -> f32 {
        self.size * native_scale(rect.width, native_w)
    }
}

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

pub fn format_hex_color(c: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", c[0], c[1], c[2])
}

// ============================================================================
// MASK SURFACE
// ============================================================================

/// Full copy of a mask buffer at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskSnapshot {
    pixels: RgbaImage,
}

impl MaskSnapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// Stroke being rendered: last native point plus the width/colour it was
/// started with.
#[derive(Clone, Copy, Debug)]
struct ActiveStroke {
    last: Point,
    radius: f32,
    color: Rgba<u8>,
}

/// Native-resolution drawing surface for one image.
///
/// Alpha is the coverage channel: anything non-zero marks a pixel for erase.
/// Strokes are painted fully opaque; translucency only exists in
/// [`MaskSurface::preview`].
#[derive(Clone, Debug)]
pub struct MaskSurface {
    pixels: RgbaImage,
    stroke: Option<ActiveStroke>,
}

impl MaskSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            stroke: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Coverage at `(x, y)`, `0` outside the surface.
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel_checked(x, y).map_or(0, |p| p[3])
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Start a stroke at a native point. Nothing is painted until the
    /// stroke is extended.
    pub fn begin_stroke(&mut self, at: Point, width: f32, color: [u8; 3]) {
        self.stroke = Some(ActiveStroke {
            last: at,
            radius: (width * 0.5).max(0.5),
            color: Rgba([color[0], color[1], color[2], 255]),
        });
    }

    /// Paint a round-capped segment from the previous point to `to`.
    /// Consecutive capsules give round joins. No-op outside a stroke.
    pub fn extend_stroke(&mut self, to: Point) {
        let Some(stroke) = self.stroke else { return };
        self.paint_segment(stroke.last, to, stroke.radius, stroke.color);
        if let Some(s) = self.stroke.as_mut() {
            s.last = to;
        }
    }

    pub fn end_stroke(&mut self) {
        self.stroke = None;
    }

    /// Erase everything. Idempotent.
    pub fn clear(&mut self) {
        self.stroke = None;
        let buf: &mut [u8] = &mut self.pixels;
        buf.fill(0);
    }

    /// True iff every pixel's coverage is exactly zero.
    pub fn is_empty(&self) -> bool {
        self.pixels.as_raw().par_chunks_exact(4).all(|p| p[3] == 0)
    }

    pub fn snapshot(&self) -> MaskSnapshot {
        MaskSnapshot { pixels: self.pixels.clone() }
    }

    /// Replace the whole buffer with `snapshot`. Snapshots of a different
    /// size are refused (the buffer always matches its image).
    pub fn restore(&mut self, snapshot: MaskSnapshot) -> bool {
        if snapshot.pixels.dimensions() != self.pixels.dimensions() {
            return false;
        }
        self.stroke = None;
        self.pixels = snapshot.pixels;
        true
    }

    /// Mark every pixel where `coverage` has non-zero alpha.
    /// `coverage` is aligned to the top-left corner and clipped.
    pub fn paint_coverage(&mut self, coverage: &RgbaImage, color: [u8; 3]) {
        let w = self.width().min(coverage.width());
        let h = self.height().min(coverage.height());
        let ink = Rgba([color[0], color[1], color[2], 255]);
        for y in 0..h {
            for x in 0..w {
                if coverage.get_pixel(x, y)[3] != 0 {
                    self.pixels.put_pixel(x, y, ink);
                }
            }
        }
    }

    /// The mask as shown on screen: brush colour at `alpha` wherever covered.
    pub fn preview(&self, alpha: f32) -> RgbaImage {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        let mut out = self.pixels.clone();
        let buf: &mut [u8] = &mut out;
        buf.par_chunks_exact_mut(4).for_each(|p| {
            if p[3] != 0 {
                p[3] = a;
            }
        });
        out
    }

    /// Hard-edged capsule: every pixel whose centre lies within `radius`
    /// of segment `a..b`.
    fn paint_segment(&mut self, a: Point, b: Point, radius: f32, color: Rgba<u8>) {
        let (w, h) = self.pixels.dimensions();
        if w == 0 || h == 0 {
            return;
        }

        let min_x = (a.x.min(b.x) - radius).floor().max(0.0);
        let min_y = (a.y.min(b.y) - radius).floor().max(0.0);
        let max_x = (a.x.max(b.x) + radius).ceil().min(w as f32);
        let max_y = (a.y.max(b.y) + radius).ceil().min(h as f32);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        let r2 = radius * radius;
        for y in min_y as u32..max_y as u32 {
            for x in min_x as u32..max_x as u32 {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                if dist_sq_to_segment(px, py, a, b) <= r2 {
                    self.pixels.put_pixel(x, y, color);
                }
            }
        }
    }
}

fn dist_sq_to_segment(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    (px - cx) * (px - cx) + (py - cy) * (py - cy)
}
