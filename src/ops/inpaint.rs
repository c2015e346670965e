// ============================================================================
// Mask erase ("inpaint"): destination-out composite of a mask over a source
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::MaskSurface;

/// Draw `source` into a fresh raster of its native size, then erase every
/// pixel where `mask` has non-zero coverage.
///
/// Coverage is a stencil: its colour and amount do not matter, a covered
/// pixel always ends fully transparent. Mask pixels beyond the source's
/// bounds are ignored; source pixels beyond the mask are kept.
///
/// Callers must refuse an empty mask before getting here.
pub fn composite_erase(source: &RgbaImage, mask: &MaskSurface) -> RgbaImage {
    let (w, h) = source.dimensions();
    let mut out = source.clone();
    if w == 0 || h == 0 {
        return out;
    }

    let mask_w = mask.width().min(w) as usize;
    let mask_h = mask.height().min(h) as usize;
    let mask_stride = mask.width() as usize * 4;
    let mask_raw = mask.pixels().as_raw();
    let row_bytes = w as usize * 4;

    let buf: &mut [u8] = &mut out;
    buf.par_chunks_exact_mut(row_bytes)
        .take(mask_h)
        .enumerate()
        .for_each(|(y, row)| {
            let mask_row = &mask_raw[y * mask_stride..y * mask_stride + mask_w * 4];
            for (dst, cov) in row.chunks_exact_mut(4).zip(mask_row.chunks_exact(4)) {
                if cov[3] != 0 {
                    dst.copy_from_slice(&[0, 0, 0, 0]);
                }
            }
        });

    out
}

/// Count of pixels `composite_erase` would clear.
pub fn erased_pixel_count(mask: &MaskSurface) -> usize {
    mask.pixels()
        .as_raw()
        .par_chunks_exact(4)
        .filter(|p| p[3] != 0)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Point;
    use image::Rgba;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 200, 255]))
    }

    #[test]
    fn single_covered_pixel_is_erased_and_rest_untouched() {
        let src = gradient(12, 9);
        let mut cover = RgbaImage::new(12, 9);
        cover.put_pixel(7, 3, Rgba([1, 2, 3, 255]));
        let mut mask = MaskSurface::new(12, 9);
        mask.paint_coverage(&cover, [0, 255, 0]);

        let out = composite_erase(&src, &mask);
        assert_eq!(out.dimensions(), src.dimensions());
        for (x, y, p) in out.enumerate_pixels() {
            if (x, y) == (7, 3) {
                assert_eq!(p.0, [0, 0, 0, 0]);
            } else {
                assert_eq!(p, src.get_pixel(x, y), "pixel ({x}, {y}) changed");
            }
        }
    }

    #[test]
    fn erase_ignores_mask_colour() {
        let src = gradient(6, 6);
        let mut red = MaskSurface::new(6, 6);
        let mut blue = MaskSurface::new(6, 6);
        for (mask, color) in [(&mut red, [255, 0, 0]), (&mut blue, [0, 0, 255])] {
            mask.begin_stroke(Point::new(0.0, 3.0), 2.0, color);
            mask.extend_stroke(Point::new(6.0, 3.0));
        }
        assert_eq!(composite_erase(&src, &red), composite_erase(&src, &blue));
    }

    #[test]
    fn source_is_not_modified() {
        let src = gradient(4, 4);
        let before = src.clone();
        let mut mask = MaskSurface::new(4, 4);
        mask.begin_stroke(Point::new(0.0, 0.0), 8.0, [0, 255, 0]);
        mask.extend_stroke(Point::new(4.0, 4.0));
        let out = composite_erase(&src, &mask);
        assert_eq!(src, before);
        assert!(out.pixels().all(|p| p[3] == 0));
        assert_eq!(erased_pixel_count(&mask), 16);
    }
}
