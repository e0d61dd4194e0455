//! Backend shader container codec.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic[3] version u8 | outputs_hash u32 | inputs_hash u32 | uniform_count u16
//! uniform_count × { name_len u8, name, type u8, num u8, offset u16, reg_count u16 }
//! bytecode_len u32 | bytecode | 0u8
//! attribute_count u8 | attribute_count × attrib_id u16
//! uniform_block_size u16
//! ```

use crate::backend::{
    UNIFORM_FRAGMENT_BIT, UNIFORM_SAMPLER_BIT, UNIFORM_TYPE_MAT4, UNIFORM_TYPE_SAMPLER,
    UNIFORM_TYPE_VEC4,
};
use crate::config::ShaderBinaryConfig;
use crate::error::{EngineError, Result};

use super::reflect::{StageReflection, UniformKind};
use super::Stage;

/// One uniform entry of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformRecord {
    pub name: String,
    /// `UNIFORM_TYPE_*` tag combined with the fragment/sampler bits.
    pub type_tag: u8,
    /// Array element count; unused by the backend, always written as 0.
    pub num: u8,
    pub offset: u16,
    pub register_count: u16,
}

/// A decoded or ready-to-encode shader container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinary {
    pub stage: Stage,
    pub version: u8,
    pub outputs_hash: u32,
    pub inputs_hash: u32,
    pub uniforms: Vec<UniformRecord>,
    pub bytecode: Vec<u8>,
    /// Backend attribute ids, in stage input order.
    pub attributes: Vec<u16>,
    pub uniform_block_size: u16,
}

impl ShaderBinary {
    /// Builds the container for one reflected stage.
    ///
    /// Fails when a name or count does not fit its field width.
    pub fn from_reflection(
        stage: Stage,
        reflection: &StageReflection,
        bytecode: Vec<u8>,
        config: &ShaderBinaryConfig,
    ) -> Result<Self> {
        let fragment_bit = if stage.is_fragment() { UNIFORM_FRAGMENT_BIT } else { 0 };

        if reflection.uniforms.len() > u16::MAX as usize {
            return Err(EngineError::MalformedShader(format!(
                "{} uniforms exceed the container limit",
                reflection.uniforms.len()
            )));
        }

        let uniforms = reflection
            .uniforms
            .iter()
            .map(|u| {
                if u.name.len() > u8::MAX as usize {
                    return Err(EngineError::UnsupportedUniform {
                        name: u.name.clone(),
                        reason: "name longer than 255 bytes".to_string(),
                    });
                }

                let type_tag = match u.kind {
                    UniformKind::Vector { .. } => UNIFORM_TYPE_VEC4 | fragment_bit,
                    UniformKind::Matrix4 => UNIFORM_TYPE_MAT4 | fragment_bit,
                    UniformKind::Sampler => UNIFORM_TYPE_SAMPLER | UNIFORM_SAMPLER_BIT,
                };

                Ok(UniformRecord {
                    name: u.name.clone(),
                    type_tag,
                    num: 0,
                    offset: u.offset,
                    register_count: u.register_count,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let attributes: Vec<u16> = match stage {
            Stage::Vertex => reflection.attributes.iter().map(|a| a.attrib.id()).collect(),
            Stage::Fragment => Vec::new(),
        };
        if attributes.len() > u8::MAX as usize {
            return Err(EngineError::MalformedShader(format!(
                "{} vertex inputs exceed the container limit",
                attributes.len()
            )));
        }

        if u32::try_from(bytecode.len()).is_err() {
            return Err(EngineError::MalformedShader(
                "bytecode larger than 4 GiB".to_string(),
            ));
        }

        let uniform_block_size = u16::try_from(reflection.uniform_block_size).map_err(|_| {
            EngineError::MalformedShader(format!(
                "uniform block of {} bytes exceeds the container limit",
                reflection.uniform_block_size
            ))
        })?;

        Ok(Self {
            stage,
            version: config.version,
            outputs_hash: config.outputs_hash,
            inputs_hash: config.inputs_hash,
            uniforms,
            bytecode,
            attributes,
            uniform_block_size,
        })
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        let uniforms: usize = self.uniforms.iter().map(|u| 1 + u.name.len() + 6).sum();
        4 + 4 + 4 + 2 + uniforms + 4 + self.bytecode.len() + 1 + 1 + 2 * self.attributes.len() + 2
    }

    /// Serializes the container.
    ///
    /// Field widths were validated by [`ShaderBinary::from_reflection`]; a value
    /// built by hand with oversized fields is truncated.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());

        out.extend_from_slice(&self.stage.magic());
        out.push(self.version);
        out.extend_from_slice(&self.outputs_hash.to_le_bytes());
        out.extend_from_slice(&self.inputs_hash.to_le_bytes());

        out.extend_from_slice(&(self.uniforms.len() as u16).to_le_bytes());
        for u in &self.uniforms {
            out.push(u.name.len() as u8);
            out.extend_from_slice(u.name.as_bytes());
            out.push(u.type_tag);
            out.push(u.num);
            out.extend_from_slice(&u.offset.to_le_bytes());
            out.extend_from_slice(&u.register_count.to_le_bytes());
        }

        out.extend_from_slice(&(self.bytecode.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.bytecode);
        out.push(0);

        out.push(self.attributes.len() as u8);
        for id in &self.attributes {
            out.extend_from_slice(&id.to_le_bytes());
        }

        out.extend_from_slice(&self.uniform_block_size.to_le_bytes());
        out
    }

    /// Parses a container the way the backend does.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);

        let magic = r.take(3)?;
        let stage = if magic == Stage::Vertex.magic() {
            Stage::Vertex
        } else if magic == Stage::Fragment.magic() {
            Stage::Fragment
        } else {
            return Err(malformed(format!("unknown magic {magic:02x?}")));
        };
        let version = r.u8()?;
        let outputs_hash = r.u32()?;
        let inputs_hash = r.u32()?;

        let count = r.u16()?;
        let mut uniforms = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = r.u8()? as usize;
            let name = std::str::from_utf8(r.take(len)?)
                .map_err(|_| malformed("uniform name is not UTF-8".to_string()))?
                .to_string();
            uniforms.push(UniformRecord {
                name,
                type_tag: r.u8()?,
                num: r.u8()?,
                offset: r.u16()?,
                register_count: r.u16()?,
            });
        }

        let len = r.u32()? as usize;
        let bytecode = r.take(len)?.to_vec();
        let terminator = r.u8()?;
        if terminator != 0 {
            return Err(malformed(format!("bytecode terminator is {terminator:#04x}")));
        }

        let attribute_count = r.u8()?;
        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            attributes.push(r.u16()?);
        }

        let uniform_block_size = r.u16()?;

        if r.remaining() != 0 {
            return Err(malformed(format!("{} trailing bytes", r.remaining())));
        }

        Ok(Self {
            stage,
            version,
            outputs_hash,
            inputs_hash,
            uniforms,
            bytecode,
            attributes,
            uniform_block_size,
        })
    }
}

fn malformed(msg: String) -> EngineError {
    EngineError::MalformedShader(msg)
}

struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'b [u8]> {
        if self.remaining() < n {
            return Err(malformed(format!(
                "truncated at byte {}: wanted {n}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }
}
