//! Shader translation.
//!
//! Pipeline, leaf-first:
//! - a [`ShaderCompiler`] front-end turns two source strings into per-stage
//!   bytecode plus reflection data
//! - [`reflect_stage`] validates the reflection and extracts uniform descriptors
//!   and vertex attributes
//! - [`ShaderBinary`] serializes a stage into the backend's shader container
//! - [`ProgramData`] owns the created backend objects and the name lookups

pub mod compiler;
pub mod glsl;

mod container;
mod program;
mod reflect;

pub use compiler::{
    BaseType, BlockMember, CompiledStage, MemberType, SamplerResource, ShaderCompiler,
    ShaderReflection, StageInput, UniformBlock,
};
pub use container::{ShaderBinary, UniformRecord};
pub use glsl::GlslCompiler;
pub use program::{
    patch_fragment_source, ProgramData, ProgramHandle, StageUniforms, UniformData, UniformRef,
};
pub use reflect::{reflect_stage, StageAttribute, StageReflection, UniformDescriptor, UniformKind};

use core::fmt;

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    #[inline]
    pub const fn is_fragment(self) -> bool {
        matches!(self, Stage::Fragment)
    }

    /// First three magic bytes of this stage's shader container.
    #[inline]
    pub const fn magic(self) -> [u8; 3] {
        match self {
            Stage::Vertex => *b"VSH",
            Stage::Fragment => *b"FSH",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}
