//! Canvas normalisation: letterbox a page image onto a fixed-size canvas.
//!
//! The page is shrunk (never enlarged) to fit, keeping its aspect ratio, then
//! pasted centred on a canvas filled with the background colour. Pure
//! in-memory transformation; the only failure mode (zero-sized canvas) is
//! ruled out when the [`CanvasSpec`] is constructed.

use crate::config::CanvasSpec;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

/// Size of `(width, height)` after shrinking to fit inside
/// `(max_width, max_height)`.
///
/// Images that already fit are returned unchanged. Otherwise the tighter
/// axis becomes exactly the bound and the other axis is rounded to whichever
/// of floor/ceil keeps the aspect ratio closest to the source (minimum 1 px).
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    let (bx, by) = (max_width as f64, max_height as f64);

    if bx / by >= aspect {
        // Height is the binding constraint.
        let w = round_aspect(by * aspect, |n| (aspect - n / by).abs());
        (w, max_height)
    } else {
        // Width is the binding constraint.
        let h = round_aspect(bx / aspect, |n| {
            if n == 0.0 {
                0.0
            } else {
                (aspect - bx / n).abs()
            }
        });
        (max_width, h)
    }
}

/// Pick floor or ceil of `value`, whichever minimises `error`; at least 1.
fn round_aspect(value: f64, error: impl Fn(f64) -> f64) -> u32 {
    let lo = value.floor();
    let hi = value.ceil();
    let best = if error(hi) < error(lo) { hi } else { lo };
    (best as u32).max(1)
}

/// Top-left position that centres a `(w, h)` image on the canvas, truncating
/// fractional offsets.
pub fn center_offset(canvas: &CanvasSpec, w: u32, h: u32) -> (u32, u32) {
    (
        canvas.width().saturating_sub(w) / 2,
        canvas.height().saturating_sub(h) / 2,
    )
}

/// Produce a `canvas.width() × canvas.height()` RGB image with `image`
/// shrunk to fit and centred on the background colour.
///
/// Transparent source pixels are composited over the background.
pub fn normalize(image: &DynamicImage, canvas: &CanvasSpec) -> DynamicImage {
    let (w, h) = fit_within(image.width(), image.height(), canvas.width(), canvas.height());

    let page: RgbaImage = if (w, h) == (image.width(), image.height()) {
        image.to_rgba8()
    } else {
        imageops::resize(&image.to_rgba8(), w, h, FilterType::Lanczos3)
    };

    let [r, g, b] = canvas.background().0 .0;
    let mut frame = RgbaImage::from_pixel(canvas.width(), canvas.height(), Rgba([r, g, b, 255]));

    let (x, y) = center_offset(canvas, w, h);
    imageops::overlay(&mut frame, &page, i64::from(x), i64::from(y));

    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(frame).to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Background;
    use image::{GenericImageView, Rgb, RgbImage};

    fn canvas(w: u32, h: u32) -> CanvasSpec {
        CanvasSpec::new(w, h, Background::WHITE).unwrap()
    }

    #[test]
    fn tall_image_into_square_canvas() {
        // 64/96 = 0.667 → 21.33 wide, rounded to 21; offset (64-21)/2 = 21.
        assert_eq!(fit_within(32, 96, 64, 64), (21, 64));
        assert_eq!(center_offset(&canvas(64, 64), 21, 64), (21, 0));

        let src = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 96, Rgb([255, 0, 0])));
        let out = normalize(&src, &canvas(64, 64));
        assert_eq!(out.dimensions(), (64, 64));

        let rgb = out.to_rgb8();
        // Left margin is background, the scaled page starts at x = 21.
        assert_eq!(*rgb.get_pixel(10, 32), Rgb([255, 255, 255]));
        assert_eq!(*rgb.get_pixel(31, 32), Rgb([255, 0, 0]));
        assert_eq!(*rgb.get_pixel(55, 32), Rgb([255, 255, 255]));
    }

    #[test]
    fn image_that_fits_is_not_scaled() {
        assert_eq!(fit_within(10, 20, 64, 64), (10, 20));
        assert_eq!(fit_within(64, 64, 64, 64), (64, 64));

        let mut src = RgbImage::from_pixel(10, 20, Rgb([0, 0, 255]));
        src.put_pixel(0, 0, Rgb([1, 2, 3]));
        let out = normalize(&DynamicImage::ImageRgb8(src.clone()), &canvas(64, 64)).to_rgb8();

        let (ox, oy) = center_offset(&canvas(64, 64), 10, 20);
        assert_eq!((ox, oy), (27, 22));
        for (x, y, px) in src.enumerate_pixels() {
            assert_eq!(out.get_pixel(ox + x, oy + y), px);
        }
        assert_eq!(*out.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn one_axis_overflow_scales_uniformly() {
        // Wide page: width is binding, height shrinks by the same factor.
        assert_eq!(fit_within(200, 50, 100, 100), (100, 25));
        // Tall page.
        assert_eq!(fit_within(50, 200, 100, 100), (25, 100));
    }

    #[test]
    fn aspect_ratio_is_preserved_within_a_pixel() {
        let cases = [
            (2480, 3508, 1447, 2048),
            (1754, 1240, 1447, 2048),
            (3000, 1000, 640, 480),
            (333, 999, 100, 100),
            (1000, 7, 100, 100),
        ];
        for (w, h, cw, ch) in cases {
            let (sw, sh) = fit_within(w, h, cw, ch);
            assert!(sw <= cw && sh <= ch, "{w}x{h} → {sw}x{sh} exceeds {cw}x{ch}");
            assert!(sw == cw || sh == ch, "{w}x{h} → {sw}x{sh} touches no edge");
            let ideal_w = sh as f64 * w as f64 / h as f64;
            let ideal_h = sw as f64 * h as f64 / w as f64;
            assert!(
                (sw as f64 - ideal_w).abs() <= 1.0 || (sh as f64 - ideal_h).abs() <= 1.0,
                "{w}x{h} → {sw}x{sh} distorts aspect"
            );
        }
    }

    #[test]
    fn extreme_aspect_never_collapses_to_zero() {
        assert_eq!(fit_within(10_000, 1, 100, 100), (100, 1));
        assert_eq!(fit_within(1, 10_000, 100, 100), (1, 100));
    }

    #[test]
    fn normalizing_twice_is_identity() {
        let mut src = RgbImage::new(300, 120);
        for (x, y, px) in src.enumerate_pixels_mut() {
            *px = Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
        let spec = canvas(100, 100);
        let once = normalize(&DynamicImage::ImageRgb8(src), &spec);
        let twice = normalize(&once, &spec);
        assert_eq!(once.to_rgb8().as_raw(), twice.to_rgb8().as_raw());
    }

    #[test]
    fn transparency_shows_background() {
        let spec = CanvasSpec::new(4, 4, Background(Rgb([10, 20, 30]))).unwrap();
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 0, 0, 0])));
        let out = normalize(&src, &spec);
        assert!(!out.color().has_alpha());
        assert_eq!(*out.to_rgb8().get_pixel(2, 2), Rgb([10, 20, 30]));
    }

    #[test]
    fn output_is_exact_canvas_size() {
        let src = DynamicImage::new_rgb8(2480, 3508);
        let out = normalize(&src, &CanvasSpec::DEFAULT_BATCH);
        assert_eq!(out.dimensions(), (1447, 2048));
    }
}
