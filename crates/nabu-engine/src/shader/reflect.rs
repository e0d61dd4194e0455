use crate::backend::Attrib;
use crate::error::{EngineError, Result};

use super::compiler::{BaseType, MemberType, ShaderReflection};
use super::Stage;

/// Semantic type of a uniform as the backend sees it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// Float scalar or vector; always occupies one 4-float register.
    Vector { components: u8 },
    /// 4x4 float matrix; four contiguous registers.
    Matrix4,
    /// Texture sampler; no register storage.
    Sampler,
}

impl UniformKind {
    #[inline]
    pub const fn register_count(self) -> u16 {
        match self {
            UniformKind::Vector { .. } => 1,
            UniformKind::Matrix4 => 4,
            UniformKind::Sampler => 0,
        }
    }
}

/// One reflected uniform of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDescriptor {
    pub name: String,
    pub kind: UniformKind,
    /// Byte offset inside the stage's uniform buffer (0 for samplers).
    pub offset: u16,
    pub register_count: u16,
    pub stage: Stage,
    /// Texture stage a sampler binds to.
    pub slot: Option<u8>,
}

/// A vertex input and the attribute slot its location maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAttribute {
    pub name: String,
    pub location: u32,
    pub attrib: Attrib,
}

/// Validated reflection of one stage, ready to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReflection {
    pub stage: Stage,
    /// Block members in declaration order, followed by samplers.
    pub uniforms: Vec<UniformDescriptor>,
    /// Vertex inputs; always empty for the fragment stage.
    pub attributes: Vec<StageAttribute>,
    pub uniform_block_size: u32,
}

impl StageReflection {
    pub fn samplers(&self) -> impl Iterator<Item = &UniformDescriptor> {
        self.uniforms.iter().filter(|u| u.kind == UniformKind::Sampler)
    }
}

/// Extracts the uniform and attribute tables of one stage.
///
/// # Panics
/// Panics unless the stage declares exactly one uniform buffer.
pub fn reflect_stage(stage: Stage, reflection: &ShaderReflection) -> Result<StageReflection> {
    assert_eq!(
        reflection.uniform_buffers.len(),
        1,
        "{stage} stage must declare exactly one uniform buffer"
    );
    let block = &reflection.uniform_buffers[0];

    let mut uniforms = Vec::with_capacity(block.members.len() + reflection.samplers.len());

    for member in &block.members {
        let kind = classify_member(&member.name, &member.ty)?;
        let offset = u16::try_from(member.offset).map_err(|_| EngineError::UnsupportedUniform {
            name: member.name.clone(),
            reason: format!("offset {} does not fit the container", member.offset),
        })?;

        uniforms.push(UniformDescriptor {
            name: member.name.clone(),
            kind,
            offset,
            register_count: kind.register_count(),
            stage,
            slot: None,
        });
    }

    for sampler in &reflection.samplers {
        let slot = u8::try_from(sampler.binding).map_err(|_| EngineError::UnsupportedUniform {
            name: sampler.name.clone(),
            reason: format!("binding {} exceeds the texture stage range", sampler.binding),
        })?;

        uniforms.push(UniformDescriptor {
            name: sampler.name.clone(),
            kind: UniformKind::Sampler,
            offset: 0,
            register_count: 0,
            stage,
            slot: Some(slot),
        });
    }

    let attributes = match stage {
        Stage::Vertex => reflection
            .stage_inputs
            .iter()
            .map(|input| {
                Ok(StageAttribute {
                    name: input.name.clone(),
                    location: input.location,
                    attrib: Attrib::from_location(input.location)?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Stage::Fragment => Vec::new(),
    };

    Ok(StageReflection {
        stage,
        uniforms,
        attributes,
        uniform_block_size: block.declared_size,
    })
}

fn classify_member(name: &str, ty: &MemberType) -> Result<UniformKind> {
    let unsupported = |reason: String| EngineError::UnsupportedUniform {
        name: name.to_string(),
        reason,
    };

    if ty.base != BaseType::Float {
        return Err(unsupported(format!("{:?} members are not supported", ty.base)));
    }

    if !ty.array.is_empty() {
        return Err(unsupported("uniform arrays are not supported".to_string()));
    }

    match (ty.columns, ty.vecsize) {
        (1, components @ 1..=4) => Ok(UniformKind::Vector { components }),
        (4, 4) => Ok(UniformKind::Matrix4),
        (columns, rows) => Err(unsupported(format!(
            "{columns}x{rows} shapes are not supported"
        ))),
    }
}
