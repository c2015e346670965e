use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;

/// Cache for rasterized glyph pixel data. Key: (GlyphId, px_scale_bits).
/// Value: (pixels as (x, y, coverage), bounds_min_x at origin zero, bounds_min_y at origin zero).
pub type GlyphPixelCache = HashMap<(GlyphId, u32), (Vec<(u32, u32, f32)>, f32, f32)>;

/// Weight from which a face counts as bold; lighter faces get synthetic bold.
const BOLD_WEIGHT: u16 = 600;

/// A face ready for drawing, with its own glyph cache.
pub struct LoadedFont {
    pub font: FontArc,
    pub weight: u16,
    glyphs: GlyphPixelCache,
}

impl LoadedFont {
    pub fn new(font: FontArc, weight: u16) -> Self {
        Self { font, weight, glyphs: HashMap::new() }
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= BOLD_WEIGHT
    }

    /// Scale at which one em is `font_size` pixels (CSS `font-size`).
    pub fn css_scale(&self, font_size: f32) -> PxScale {
        let upem = self.font.units_per_em().unwrap_or(1.0);
        PxScale::from(font_size * self.font.height_unscaled() / upem)
    }
}

/// Bold faces looked up by family name, loaded once each.
#[derive(Default)]
pub struct FontBook {
    fonts: HashMap<String, LoadedFont>,
    /// Resolve unknown families from the system font database.
    system_lookup: bool,
}

impl FontBook {
    /// Book backed by installed system fonts.
    pub fn system() -> Self {
        Self { fonts: HashMap::new(), system_lookup: true }
    }

    /// Book that only knows explicitly inserted faces.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, family: &str, font: LoadedFont) {
        self.fonts.insert(family.to_string(), font);
    }

    /// Bold face for `family`, falling back to the system sans-serif.
    pub fn bold(&mut self, family: &str) -> Option<&mut LoadedFont> {
        if !self.fonts.contains_key(family) {
            if !self.system_lookup {
                return None;
            }
            let loaded = load_system_font(family, 700, false)?;
            crate::log_info!(
                "Loaded font for '{}' (weight {})",
                family,
                loaded.weight
            );
            self.fonts.insert(family.to_string(), loaded);
        }
        self.fonts.get_mut(family)
    }
}

/// Lay out a single line, left-aligned at x = 0.
/// Returns `(glyphs as (id, x), total_advance)`.
pub fn layout_line(font: &FontArc, text: &str, scale: PxScale) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(scale);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Draw one line of text onto `canvas` with its em box's top-left at
/// `(x, top)`, blending `color` source-over. Bold is synthesized for faces
/// lighter than semi-bold.
pub fn draw_text_line(
    canvas: &mut RgbaImage,
    face: &mut LoadedFont,
    text: &str,
    x: f32,
    top: f32,
    font_size: f32,
    color: [u8; 3],
) {
    if text.is_empty() || canvas.width() == 0 || canvas.height() == 0 {
        return;
    }

    let scale = face.css_scale(font_size);
    let ascent = face.font.as_scaled(scale).ascent();
    let baseline = top + ascent;
    let synthetic_bold = !face.is_bold();
    let (glyphs, _) = layout_line(&face.font, text, scale);

    // Glyphs are cached at position (0,0) and shifted to the actual pen position.
    let scale_key = scale.y.to_bits();
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    for (glyph_id, gx) in glyphs {
        let cache_key = (glyph_id, scale_key);
        if !face.glyphs.contains_key(&cache_key) {
            let base_glyph = glyph_id.with_scale_and_position(scale, point(0.0, 0.0));
            let mut px_list = Vec::new();
            let (bx, by) = if let Some(outlined) = face.font.outline_glyph(base_glyph) {
                let b = outlined.px_bounds();
                outlined.draw(|px, py, cov| px_list.push((px, py, cov)));
                (b.min.x, b.min.y)
            } else {
                (0.0, 0.0)
            };
            face.glyphs.insert(cache_key, (px_list, bx, by));
        }

        let Some((pixels, base_bx, base_by)) = face.glyphs.get(&cache_key) else {
            continue;
        };
        let origin_x = (x + gx).round() + base_bx;
        let origin_y = baseline.round() + base_by;
        for &(px, py, cov) in pixels {
            let ix = (origin_x + px as f32).round() as i32;
            let iy = (origin_y + py as f32).round() as i32;
            let cov = cov.clamp(0.0, 1.0);
            if iy < 0 || iy >= ch {
                continue;
            }
            if ix >= 0 && ix < cw {
                blend_over(canvas.get_pixel_mut(ix as u32, iy as u32), color, cov);
            }
            if synthetic_bold && ix + 1 >= 0 && ix + 1 < cw {
                blend_over(canvas.get_pixel_mut((ix + 1) as u32, iy as u32), color, cov);
            }
        }
    }
}

/// Source-over of an opaque colour at `alpha` onto a straight-alpha pixel.
pub fn blend_over(dst: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let a = alpha.min(1.0);
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = a + dst_a * (1.0 - a);
    if out_a <= 0.0 {
        return;
    }
    for i in 0..3 {
        let src = color[i] as f32;
        let under = dst[i] as f32;
        let v = (src * a + under * dst_a * (1.0 - a)) / out_a;
        dst[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Load a font by family name, weight and style from the system, falling
/// back to the default sans-serif. `weight` is CSS-style (400 = Regular,
/// 700 = Bold). Returns `None` if nothing usable is installed.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<LoadedFont> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &props,
        )
        .ok()?;

    let font_data = handle.load().ok()?;
    let loaded_weight = font_data.properties().weight.0.round() as u16;
    // Collections (.ttc) hold several faces; the handle names which one matched.
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    let face = ab_glyph::FontVec::try_from_vec_and_index(bytes, face_index(&handle)).ok()?;
    Some(LoadedFont::new(FontArc::new(face), loaded_weight))
}

fn face_index(handle: &font_kit::handle::Handle) -> u32 {
    use font_kit::handle::Handle;
    match handle {
        Handle::Path { font_index, .. } | Handle::Memory { font_index, .. } => *font_index,
    }
}
