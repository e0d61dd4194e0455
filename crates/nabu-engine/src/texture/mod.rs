//! Texture data owned by the render context.
//!
//! Images are decoded on the CPU with the `image` crate; their pixels move into
//! the backend upload.

mod cube;
mod decode;

pub use cube::{cube_pixels, CUBE_FACES};
pub use decode::{decode_image, flip_y_in_image_bytes, DecodedImage};

use crate::backend::TextureId;
use crate::handle::Handle;

pub type TextureHandle = Handle<TextureData>;

/// The backend texture a handle currently names.
///
/// Empty until a load operation succeeds.
#[derive(Debug, Default)]
pub struct TextureData {
    pub texture: Option<TextureId>,
    pub cube: bool,
    /// `(width, height)` of the uploaded image; only 2D textures have one.
    pub size: Option<(u32, u32)>,
}

impl TextureData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.texture.is_some()
    }

    fn size_2d(&self, what: &str) -> (u32, u32) {
        match self.size {
            Some(size) if !self.cube => size,
            _ => panic!("texture {what} requested on a cube or unloaded texture"),
        }
    }

    /// # Panics
    /// Panics for cube textures and textures that were never loaded.
    pub fn width(&self) -> u32 {
        self.size_2d("width").0
    }

    /// # Panics
    /// Panics for cube textures and textures that were never loaded.
    pub fn height(&self) -> u32 {
        self.size_2d("height").1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_not_width() {
        let data = TextureData {
            texture: Some(TextureId(0)),
            cube: false,
            size: Some((8, 2)),
        };
        assert_eq!((data.width(), data.height()), (8, 2));
    }

    #[test]
    #[should_panic(expected = "cube or unloaded")]
    fn cube_has_no_2d_size() {
        let data = TextureData {
            texture: Some(TextureId(0)),
            cube: true,
            size: None,
        };
        let _ = data.width();
    }

    #[test]
    #[should_panic(expected = "cube or unloaded")]
    fn unloaded_texture_has_no_size() {
        let _ = TextureData::new().height();
    }
}
