use crate::error::{EngineError, Result};

use super::decode::{flip_y_in_image_bytes, DecodedImage};

pub const CUBE_FACES: usize = 6;

/// Concatenates cube images into one upload.
///
/// `levels[mip][face]` is the input; the output runs face-major, each face
/// followed by its mip chain. With `flip_y` every image is mirrored vertically
/// as it is copied.
pub fn cube_pixels(levels: &[Vec<DecodedImage>], flip_y: bool) -> Result<Vec<u8>> {
    let Some(first) = levels.first() else {
        return Err(EngineError::InvalidArgument("cube texture without mip levels".to_string()));
    };
    if let Some((mip, faces)) = levels.iter().enumerate().find(|(_, f)| f.len() != first.len()) {
        return Err(EngineError::InvalidArgument(format!(
            "mip level {mip} has {} faces, expected {}",
            faces.len(),
            first.len()
        )));
    }

    let total: usize = levels.iter().flatten().map(DecodedImage::byte_len).sum();
    let mut out = Vec::with_capacity(total);

    for face in 0..first.len() {
        for level in levels {
            let image = &level[face];
            let start = out.len();
            out.extend_from_slice(&image.pixels);
            if flip_y && image.height > 0 {
                let rows = image.height as usize;
                flip_y_in_image_bytes(&mut out[start..], rows, image.byte_len() / rows);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureFormat;

    fn image(face: u8, mip: u8, side: u32) -> DecodedImage {
        let rows = side as usize;
        let pitch = side as usize * 4;
        DecodedImage {
            width: side,
            height: side,
            format: TextureFormat::Rgba8,
            pixels: (0..rows * pitch)
                .map(|i| (face as usize * 16 + mip as usize + (i / pitch) * 40) as u8)
                .collect(),
        }
    }

    fn levels(mips: u8) -> Vec<Vec<DecodedImage>> {
        (0..mips)
            .map(|mip| (0..CUBE_FACES as u8).map(|face| image(face, mip, 4 >> mip)).collect())
            .collect()
    }

    #[test]
    fn output_is_face_major_then_mip() {
        let input = levels(3);
        let out = cube_pixels(&input, false).unwrap();

        let expected_len: usize = input.iter().flatten().map(|i| i.byte_len()).sum();
        assert_eq!(out.len(), expected_len);

        let mut offset = 0;
        for face in 0..CUBE_FACES {
            for mip in 0..3 {
                let image = &input[mip][face];
                assert_eq!(&out[offset..offset + image.byte_len()], &image.pixels[..]);
                offset += image.byte_len();
            }
        }
    }

    #[test]
    fn flip_applies_per_image() {
        let input = levels(2);
        let out = cube_pixels(&input, true).unwrap();

        // first row of face 0 mip 0 is the last source row
        let src = &input[0][0];
        let pitch = src.row_pitch();
        let last_row = &src.pixels[src.byte_len() - pitch..];
        assert_eq!(&out[..pitch], last_row);

        // mip 1 of face 0 follows immediately, also flipped
        let mip1 = &input[1][0];
        let at = src.byte_len();
        assert_eq!(
            &out[at..at + mip1.row_pitch()],
            &mip1.pixels[mip1.byte_len() - mip1.row_pitch()..]
        );
    }

    #[test]
    fn ragged_levels_are_rejected() {
        let mut input = levels(2);
        input[1].pop();
        assert!(matches!(cube_pixels(&input, false), Err(EngineError::InvalidArgument(_))));
        assert!(cube_pixels(&[], false).is_err());
    }
}
