//! Shader front-end contract.
//!
//! A front-end compiles a vertex/fragment source pair in one call and hands
//! back, per stage, an opaque bytecode payload plus read-only reflection of
//! what the stage declares. The engine never inspects the bytecode.

use crate::error::Result;

/// Scalar kind underlying a uniform member.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
    Float,
    Double,
    Int,
    UInt,
    Bool,
}

/// Shape of a uniform block member.
///
/// `columns == 1` is a scalar or vector of `vecsize` components; otherwise a
/// matrix of `columns` column vectors. `array` lists array dimensions, empty
/// for non-arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberType {
    pub base: BaseType,
    pub vecsize: u8,
    pub columns: u8,
    pub array: Vec<u32>,
}

impl MemberType {
    pub fn float(vecsize: u8) -> Self {
        Self {
            base: BaseType::Float,
            vecsize,
            columns: 1,
            array: Vec::new(),
        }
    }

    pub fn float_matrix(columns: u8, rows: u8) -> Self {
        Self {
            base: BaseType::Float,
            vecsize: rows,
            columns,
            array: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMember {
    pub name: String,
    pub ty: MemberType,
    /// Byte offset inside the block.
    pub offset: u32,
}

/// A uniform buffer and its members in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub members: Vec<BlockMember>,
    /// Declared size in bytes (end of the last member).
    pub declared_size: u32,
}

/// A separately bound sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerResource {
    pub name: String,
    pub binding: u32,
}

/// A vertex stage input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInput {
    pub name: String,
    pub location: u32,
}

/// Reflection of one compiled stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub uniform_buffers: Vec<UniformBlock>,
    pub samplers: Vec<SamplerResource>,
    pub stage_inputs: Vec<StageInput>,
}

/// Output of the front-end for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    pub bytecode: Vec<u8>,
    pub reflection: ShaderReflection,
}

/// Shader front-end.
pub trait ShaderCompiler {
    /// Compiles both stages. Failure aborts program creation.
    fn compile(&self, vertex: &str, fragment: &str) -> Result<(CompiledStage, CompiledStage)>;
}
