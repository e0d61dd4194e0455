use crate::backend::{Attrib, AttribType, LayoutAttribute, VertexLayout};
use crate::error::{EngineError, Result};

pub const GL_UNSIGNED_BYTE: u32 = 0x1401;
pub const GL_SHORT: u32 = 0x1402;
pub const GL_FLOAT: u32 = 0x1406;

/// Maps a WebGL component type code onto a backend attribute type.
pub fn attrib_type_from_gl(code: u32) -> Result<AttribType> {
    match code {
        GL_UNSIGNED_BYTE => Ok(AttribType::Uint8),
        GL_SHORT => Ok(AttribType::Int16),
        GL_FLOAT => Ok(AttribType::Float),
        other => {
            log::warn!("unsupported vertex attribute type {other}");
            Err(EngineError::UnsupportedAttribType(other))
        }
    }
}

/// One attribute of an interleaved vertex buffer as described by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexAttributeDesc {
    /// Shader input location.
    pub location: u32,
    /// Components per vertex, 1..=4.
    pub count: u8,
    pub kind: AttribType,
    pub normalized: bool,
    /// Byte offset inside one vertex.
    pub offset: u16,
}

/// Builds the backend layout for a buffer with the given stride.
pub fn build_layout(stride: u16, attributes: &[VertexAttributeDesc]) -> Result<VertexLayout> {
    if stride == 0 {
        return Err(EngineError::InvalidArgument("vertex stride must be non-zero".to_string()));
    }
    let mut layout = VertexLayout::new(stride);
    for desc in attributes {
        if !(1..=4).contains(&desc.count) {
            return Err(EngineError::InvalidArgument(format!(
                "attribute at location {} has {} components",
                desc.location, desc.count
            )));
        }
        layout.add(LayoutAttribute {
            attrib: Attrib::from_location(desc.location)?,
            count: desc.count,
            kind: desc.kind,
            normalized: desc.normalized,
            offset: desc.offset,
        });
    }
    Ok(layout)
}
