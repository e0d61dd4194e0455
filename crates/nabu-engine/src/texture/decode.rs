use image::DynamicImage;

use crate::backend::TextureFormat;
use crate::error::{EngineError, Result};

/// CPU-side pixels of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Decodes an encoded image, accepting only 8-bit RGBA and RGB.
///
/// Pixels are kept exactly as decoded; no format conversion takes place.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = (decoded.width(), decoded.height());

    let (format, pixels) = match decoded {
        DynamicImage::ImageRgba8(buf) => (TextureFormat::Rgba8, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => (TextureFormat::Rgb8, buf.into_raw()),
        other => {
            let color = format!("{:?}", other.color());
            log::warn!("rejecting {width}x{height} image with pixel format {color}");
            return Err(EngineError::UnsupportedPixelFormat(color));
        }
    };

    Ok(DecodedImage {
        width,
        height,
        format,
        pixels,
    })
}

/// Mirrors an image vertically in place by swapping rows.
///
/// # Panics
/// Panics if `bytes` is shorter than `row_count * row_pitch`.
pub fn flip_y_in_image_bytes(bytes: &mut [u8], row_count: usize, row_pitch: usize) {
    assert!(
        bytes.len() >= row_count * row_pitch,
        "{} bytes cannot hold {row_count} rows of {row_pitch}",
        bytes.len()
    );

    for row in 0..row_count / 2 {
        let back = row_count - row - 1;
        let (front_half, back_half) = bytes.split_at_mut(back * row_pitch);
        front_half[row * row_pitch..(row + 1) * row_pitch]
            .swap_with_slice(&mut back_half[..row_pitch]);
    }
}
