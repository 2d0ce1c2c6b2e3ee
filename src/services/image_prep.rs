//! Normalizes uploaded sheet images before they are sent for OCR: decode,
//! flatten to RGB, fit within `MAX_DIMENSION` and re-encode as JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{load_from_memory, ColorType, GenericImageView, ImageError};
use thiserror::Error;

pub(crate) const MAX_DIMENSION: u32 = 3000;
pub(crate) const PREPARED_MIME_TYPE: &str = "image/jpeg";
const JPEG_QUALITY: u8 = 98;

#[derive(Debug, Error)]
pub(crate) enum ImagePrepError {
    #[error("image could not be decoded: {0}")]
    Decode(ImageError),
    #[error("image could not be re-encoded: {0}")]
    Encode(ImageError),
}

/// Blocking; callers on the runtime go through `spawn_blocking`.
pub(crate) fn prepare_for_ocr(bytes: &[u8]) -> Result<Vec<u8>, ImagePrepError> {
    let decoded = load_from_memory(bytes).map_err(ImagePrepError::Decode)?;
    let (width, height) = decoded.dimensions();

    let fitted = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        tracing::debug!(width, height, "Downscaling oversized sheet image");
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        decoded
    };

    let rgb = fitted.to_rgb8();
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(ImagePrepError::Encode)?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::png_bytes;

    fn dimensions_of(jpeg: &[u8]) -> (u32, u32) {
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "output is not a JPEG");
        load_from_memory(jpeg).expect("decode prepared").dimensions()
    }

    #[test]
    fn small_png_is_reencoded_at_original_size() {
        let prepared = prepare_for_ocr(&png_bytes(40, 30)).expect("prepared");
        assert_eq!(dimensions_of(&prepared), (40, 30));
    }

    #[test]
    fn oversized_image_fits_within_the_limit() {
        let prepared = prepare_for_ocr(&png_bytes(3200, 1600)).expect("prepared");
        assert_eq!(dimensions_of(&prepared), (3000, 1500));

        let prepared = prepare_for_ocr(&png_bytes(100, 3300)).expect("prepared");
        let (width, height) = dimensions_of(&prepared);
        assert_eq!(height, MAX_DIMENSION);
        assert!(width <= 100);
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let err = prepare_for_ocr(b"\x89PNG\r\n\x1a\nnot really a png").unwrap_err();
        assert!(matches!(err, ImagePrepError::Decode(_)));
    }
}
