use crate::backend::{BUFFER_INDEX32, BUFFER_NONE};
use crate::error::{EngineError, Result};

pub const GL_UNSIGNED_SHORT: u32 = 0x1403;
pub const GL_UNSIGNED_INT: u32 = 0x1405;

/// Width of one index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    /// Maps a WebGL element type code.
    pub fn from_gl(code: u32) -> Result<Self> {
        match code {
            GL_UNSIGNED_SHORT => Ok(IndexFormat::U16),
            GL_UNSIGNED_INT => Ok(IndexFormat::U32),
            other => Err(EngineError::InvalidArgument(format!(
                "unsupported index element type {other}"
            ))),
        }
    }

    #[inline]
    pub const fn size(self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }

    /// Backend buffer creation flags.
    #[inline]
    pub const fn buffer_flags(self) -> u16 {
        match self {
            IndexFormat::U16 => BUFFER_NONE,
            IndexFormat::U32 => BUFFER_INDEX32,
        }
    }
}

/// Typed index data; the element type decides the buffer width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Reinterprets raw little-endian bytes as indices of `format`.
    pub fn from_bytes(format: IndexFormat, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % format.size() != 0 {
            return Err(EngineError::InvalidArgument(format!(
                "{} index bytes are not a whole number of {:?} indices",
                bytes.len(),
                format
            )));
        }
        Ok(match format {
            IndexFormat::U16 => IndexData::U16(bytemuck::pod_collect_to_vec(bytes)),
            IndexFormat::U32 => IndexData::U32(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            IndexData::U16(_) => IndexFormat::U16,
            IndexData::U32(_) => IndexFormat::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexData::U16(v) => bytemuck::cast_slice(v),
            IndexData::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_selects_buffer_flags() {
        assert_eq!(IndexData::U16(vec![0, 1, 2]).format().buffer_flags(), 0);
        assert_eq!(IndexData::U32(vec![0, 1, 2]).format().buffer_flags(), BUFFER_INDEX32);
    }

    #[test]
    fn bytes_are_reinterpreted_in_place() {
        let data = IndexData::from_bytes(IndexFormat::U16, &[1, 0, 2, 0, 3, 0]).unwrap();
        assert_eq!(data, IndexData::U16(vec![1, 2, 3]));
        assert_eq!(data.as_bytes(), &[1, 0, 2, 0, 3, 0]);
        assert!(IndexData::from_bytes(IndexFormat::U32, &[0; 6]).is_err());
    }

    #[test]
    fn gl_codes() {
        assert_eq!(IndexFormat::from_gl(5123).unwrap(), IndexFormat::U16);
        assert_eq!(IndexFormat::from_gl(5125).unwrap(), IndexFormat::U32);
        assert!(IndexFormat::from_gl(5121).is_err());
    }
}
