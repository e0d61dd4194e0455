//! Texture loading and sampler bookkeeping.

use crate::backend::{Backend, TextureDesc, TextureId};
use crate::error::{EngineError, Result};
use crate::texture::{cube_pixels, decode_image, TextureData, TextureHandle, CUBE_FACES};

use super::{live, live_mut, RenderContext};

impl<B: Backend> RenderContext<B> {
    /// Creates an empty texture slot; a load fills it.
    pub fn create_texture(&mut self) -> TextureHandle {
        self.textures.insert(TextureData::new())
    }

    /// Decodes one image and uploads it as a single-level 2D texture.
    ///
    /// Mip generation is not supported; `generate_mips` is only logged.
    pub fn load_texture(
        &mut self,
        texture: TextureHandle,
        bytes: &[u8],
        generate_mips: bool,
    ) -> Result<()> {
        live(&self.textures, texture, "texture");

        let image = decode_image(bytes)?;
        let desc = TextureDesc {
            width: texture_dim(image.width)?,
            height: texture_dim(image.height)?,
            has_mips: false,
            num_layers: 1,
            format: image.format,
            flags: 0,
        };
        if generate_mips {
            log::debug!("mip generation requested for texture {texture:?}; uploading level 0 only");
        }
        log::debug!(
            "texture {texture:?} loaded: {}x{} {:?}",
            image.width,
            image.height,
            image.format
        );

        let size = Some((image.width, image.height));
        let id = self.backend.create_texture_2d(desc, image.pixels);
        self.replace_texture(texture, id, false, size);
        Ok(())
    }

    /// Decodes `levels[mip][face]` and uploads one cube texture with its mip
    /// chain, optionally mirroring every image vertically.
    pub fn load_cube_texture(
        &mut self,
        texture: TextureHandle,
        levels: &[Vec<Vec<u8>>],
        flip_y: bool,
    ) -> Result<()> {
        live(&self.textures, texture, "texture");

        if let Some((mip, faces)) = levels.iter().enumerate().find(|(_, f)| f.len() != CUBE_FACES) {
            return Err(EngineError::InvalidArgument(format!(
                "cube mip level {mip} has {} faces",
                faces.len()
            )));
        }

        let decoded = levels
            .iter()
            .map(|faces| faces.iter().map(|bytes| decode_image(bytes)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;

        let Some(first) = decoded.first().and_then(|faces| faces.first()) else {
            return Err(EngineError::InvalidArgument("cube texture without mip levels".to_string()));
        };
        let format = first.format;
        if let Some(other) = decoded.iter().flatten().find(|image| image.format != format) {
            log::warn!("cube texture mixes {format:?} and {:?} images", other.format);
            return Err(EngineError::UnsupportedPixelFormat(format!(
                "{:?} mixed with {format:?}",
                other.format
            )));
        }

        let desc = TextureDesc {
            width: texture_dim(first.width)?,
            height: texture_dim(first.width)?,
            has_mips: decoded.len() > 1,
            num_layers: 1,
            format,
            flags: 0,
        };
        let pixels = cube_pixels(&decoded, flip_y)?;
        log::debug!(
            "cube texture {texture:?} loaded: side {}, {} mip level(s), {} bytes",
            desc.width,
            decoded.len(),
            pixels.len()
        );

        drop(decoded);
        let id = self.backend.create_texture_cube(desc, pixels);
        self.replace_texture(texture, id, true, None);
        Ok(())
    }

    fn replace_texture(
        &mut self,
        texture: TextureHandle,
        id: TextureId,
        cube: bool,
        size: Option<(u32, u32)>,
    ) {
        let data = live_mut(&mut self.textures, texture, "texture");
        let previous = data.texture.replace(id);
        data.cube = cube;
        data.size = size;
        if let Some(previous) = previous {
            self.backend.destroy_texture(previous);
        }
    }

    /// # Panics
    /// Panics for stale handles, cube textures and textures never loaded.
    pub fn texture_width(&self, texture: TextureHandle) -> u32 {
        live(&self.textures, texture, "texture").width()
    }

    /// # Panics
    /// Panics for stale handles, cube textures and textures never loaded.
    pub fn texture_height(&self, texture: TextureHandle) -> u32 {
        live(&self.textures, texture, "texture").height()
    }

    pub fn delete_texture(&mut self, texture: TextureHandle) {
        let Some(data) = self.textures.remove(texture) else {
            panic!("stale or foreign texture handle {texture:?}");
        };
        if let Some(id) = data.texture {
            self.backend.destroy_texture(id);
        }
    }

    // Sampler state is not forwarded to the backend.

    pub fn set_texture_sampling(&mut self, texture: TextureHandle, filter: u32) {
        live(&self.textures, texture, "texture");
        log::debug!("set_texture_sampling({filter}) on {texture:?} is not applied");
    }

    pub fn set_texture_wrap_mode(&mut self, texture: TextureHandle, u: u32, v: u32, w: u32) {
        live(&self.textures, texture, "texture");
        log::debug!("set_texture_wrap_mode({u}, {v}, {w}) on {texture:?} is not applied");
    }

    pub fn set_texture_anisotropic_level(&mut self, texture: TextureHandle, level: u32) {
        live(&self.textures, texture, "texture");
        log::debug!("set_texture_anisotropic_level({level}) on {texture:?} is not applied");
    }
}

fn texture_dim(value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        EngineError::InvalidArgument(format!("texture dimension {value} exceeds 65535"))
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::context;
    use super::*;
    use crate::backend::TextureFormat;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(img: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn png_rgba(width: u32, height: u32, seed: u8) -> Vec<u8> {
        encode(DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([seed, x as u8, y as u8, 255])
        })))
    }

    fn png_rgb(side: u32) -> Vec<u8> {
        encode(DynamicImage::ImageRgb8(ImageBuffer::from_fn(side, side, |x, _| {
            Rgb([x as u8, 0, 0])
        })))
    }

    #[test]
    fn load_texture_uploads_single_level() {
        let mut ctx = context();
        let tex = ctx.create_texture();
        ctx.load_texture(tex, &png_rgba(8, 2, 1), true).unwrap();

        assert_eq!((ctx.texture_width(tex), ctx.texture_height(tex)), (8, 2));
        let id = live(&ctx.textures, tex, "texture").texture.unwrap();
        let uploaded = ctx.backend().texture(id).unwrap();
        assert!(!uploaded.cube);
        assert_eq!(uploaded.desc.format, TextureFormat::Rgba8);
        assert!(!uploaded.desc.has_mips);
        assert_eq!(uploaded.data.len(), 8 * 2 * 4);
    }

    #[test]
    fn grayscale_is_rejected() {
        let mut ctx = context();
        let tex = ctx.create_texture();
        let gray = encode(DynamicImage::ImageLuma8(ImageBuffer::from_pixel(2, 2, Luma([9u8]))));
        let err = ctx.load_texture(tex, &gray, false).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedPixelFormat(_)));
        assert_eq!(ctx.backend().live_textures(), 0);
    }

    #[test]
    fn reload_replaces_backend_texture() {
        let mut ctx = context();
        let tex = ctx.create_texture();
        ctx.load_texture(tex, &png_rgba(2, 2, 1), false).unwrap();
        ctx.load_texture(tex, &png_rgba(4, 4, 2), false).unwrap();
        assert_eq!(ctx.backend().live_textures(), 1);
        assert_eq!(ctx.texture_width(tex), 4);
    }

    #[test]
    fn cube_upload_runs_face_major() {
        let mut ctx = context();
        let tex = ctx.create_texture();
        let levels: Vec<Vec<Vec<u8>>> = [4u32, 2]
            .iter()
            .map(|&side| (0..6).map(|face| png_rgba(side, side, face)).collect())
            .collect();
        ctx.load_cube_texture(tex, &levels, false).unwrap();

        let id = live(&ctx.textures, tex, "texture").texture.unwrap();
        let uploaded = ctx.backend().texture(id).unwrap();
        assert!(uploaded.cube);
        assert!(uploaded.desc.has_mips);
        assert_eq!(uploaded.desc.width, 4);

        let face_bytes = 4 * 4 * 4 + 2 * 2 * 4;
        assert_eq!(uploaded.data.len(), 6 * face_bytes);
        // first byte of each face block is that face's seed
        for face in 0..6 {
            assert_eq!(uploaded.data[face * face_bytes], face as u8);
        }
    }

    #[test]
    fn cube_needs_six_faces_of_one_format() {
        let mut ctx = context();
        let tex = ctx.create_texture();

        let five = vec![(0..5).map(|f| png_rgba(2, 2, f)).collect::<Vec<_>>()];
        assert!(matches!(
            ctx.load_cube_texture(tex, &five, false),
            Err(EngineError::InvalidArgument(_))
        ));

        let mut mixed: Vec<Vec<u8>> = (0..5).map(|f| png_rgba(2, 2, f)).collect();
        mixed.push(png_rgb(2));
        assert!(matches!(
            ctx.load_cube_texture(tex, &[mixed], false),
            Err(EngineError::UnsupportedPixelFormat(_))
        ));
        assert_eq!(ctx.backend().live_textures(), 0);
    }

    #[test]
    #[should_panic(expected = "cube or unloaded")]
    fn cube_has_no_width() {
        let mut ctx = context();
        let tex = ctx.create_texture();
        let levels = vec![(0..6).map(|f| png_rgba(2, 2, f)).collect::<Vec<_>>()];
        ctx.load_cube_texture(tex, &levels, true).unwrap();
        let _ = ctx.texture_width(tex);
    }

    #[test]
    fn delete_releases_backend_texture() {
        let mut ctx = context();
        let tex = ctx.create_texture();
        ctx.load_texture(tex, &png_rgba(2, 2, 0), false).unwrap();
        ctx.delete_texture(tex);
        assert_eq!(ctx.backend().live_textures(), 0);
    }
}
