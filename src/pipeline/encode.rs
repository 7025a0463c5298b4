//! Image encoding: `DynamicImage` → PNG or JPEG bytes.
//!
//! PNG keeps whatever colour model the page has. JPEG is always written from
//! RGB8 since the format has no alpha channel.

use crate::config::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page image in `format`.
pub fn encode_page(
    img: &DynamicImage,
    format: OutputFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality).encode_image(&rgb)?;
        }
    }

    debug!("Encoded {}x{} image → {} bytes {}", img.width(), img.height(), buf.len(), format);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn transparent_page() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 128])))
    }

    #[test]
    fn png_keeps_alpha() {
        let bytes = encode_page(&transparent_page(), OutputFormat::Png, 90).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn jpeg_from_rgba_has_no_alpha() {
        let bytes = encode_page(&transparent_page(), OutputFormat::Jpeg, 90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(!decoded.color().has_alpha());
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }
}
