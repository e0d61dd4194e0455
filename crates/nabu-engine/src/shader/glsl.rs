//! GLSL front-end backed by naga.
//!
//! Each stage is parsed by naga's GLSL frontend (Vulkan-flavoured GLSL 440+),
//! validated, and written out as SPIR-V; the SPIR-V words, little-endian, are
//! the stage payload. Reflection is read from the validated module:
//! - the stage's `uniform` block with its std140 member offsets
//! - `sampler` objects, whose `binding` is the texture stage they bind to
//! - vertex inputs and their `location`
//!
//! Non-opaque uniforms must live in a block. A stage without any block reports
//! an empty one so every stage carries exactly one uniform buffer.

use naga::back::spv;
use naga::front::glsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{
    AddressSpace, ArraySize, Binding, Handle, Module, ScalarKind, ShaderStage, Type, TypeInner,
};

use crate::error::{EngineError, Result};

use super::compiler::{
    BaseType, BlockMember, CompiledStage, MemberType, SamplerResource, ShaderCompiler,
    ShaderReflection, StageInput, UniformBlock,
};
use super::Stage;

/// Name of the empty block reported for stages that declare none.
pub const DEFAULT_BLOCK_NAME: &str = "$Global";

#[derive(Debug, Default, Clone, Copy)]
pub struct GlslCompiler;

impl GlslCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compiles a single stage.
    pub fn compile_stage(&self, stage: Stage, source: &str) -> Result<CompiledStage> {
        let module = glsl::Frontend::default()
            .parse(&glsl::Options::from(naga_stage(stage)), source)
            .map_err(|errors| {
                let messages: Vec<String> = errors
                    .errors
                    .iter()
                    .map(|e| format!("line {}: {}", e.meta.location(source).line_number, e.kind))
                    .collect();
                compile_error(stage, messages.join("; "))
            })?;

        let info = Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|err| compile_error(stage, err.as_inner().to_string()))?;

        let reflection =
            reflect_module(stage, &module).map_err(|msg| compile_error(stage, msg))?;

        let words = spv::write_vec(&module, &info, &spv::Options::default(), None)
            .map_err(|err| compile_error(stage, format!("SPIR-V generation failed: {err}")))?;
        let bytecode: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();

        log::trace!(
            "glsl: {stage} stage compiled to {} SPIR-V bytes, {} block member(s), \
             {} sampler(s), {} input(s)",
            bytecode.len(),
            reflection.uniform_buffers[0].members.len(),
            reflection.samplers.len(),
            reflection.stage_inputs.len()
        );

        Ok(CompiledStage { bytecode, reflection })
    }
}

impl ShaderCompiler for GlslCompiler {
    fn compile(&self, vertex: &str, fragment: &str) -> Result<(CompiledStage, CompiledStage)> {
        Ok((
            self.compile_stage(Stage::Vertex, vertex)?,
            self.compile_stage(Stage::Fragment, fragment)?,
        ))
    }
}

fn naga_stage(stage: Stage) -> ShaderStage {
    match stage {
        Stage::Vertex => ShaderStage::Vertex,
        Stage::Fragment => ShaderStage::Fragment,
    }
}

fn compile_error(stage: Stage, message: String) -> EngineError {
    EngineError::Compile(format!("{stage} shader: {message}"))
}

type ReflectResult<T> = std::result::Result<T, String>;

fn reflect_module(stage: Stage, module: &Module) -> ReflectResult<ShaderReflection> {
    let mut reflection = ShaderReflection::default();

    for (_, var) in module.global_variables.iter() {
        let name = var.name.clone().unwrap_or_default();
        let ty = &module.types[var.ty];
        match (var.space, &ty.inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members: fields, .. }) => {
                let members = fields
                    .iter()
                    .map(|m| {
                        Ok(BlockMember {
                            name: m.name.clone().unwrap_or_default(),
                            ty: member_type(module, m.ty)?,
                            offset: m.offset,
                        })
                    })
                    .collect::<ReflectResult<Vec<_>>>()?;
                let declared_size = fields.last().map_or(0, |last| {
                    last.offset + module.types[last.ty].inner.size(module.to_ctx())
                });
                reflection.uniform_buffers.push(UniformBlock {
                    name: ty.name.clone().unwrap_or(name),
                    members,
                    declared_size,
                });
            }
            (AddressSpace::Uniform, _) => {
                return Err(format!("uniform `{name}` must be declared inside a uniform block"));
            }
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => {
                reflection.samplers.push(SamplerResource {
                    name,
                    binding: var.binding.as_ref().map_or(0, |b| b.binding),
                });
            }
            _ => {}
        }
    }

    if reflection.uniform_buffers.is_empty() {
        reflection.uniform_buffers.push(UniformBlock {
            name: DEFAULT_BLOCK_NAME.to_string(),
            members: Vec::new(),
            declared_size: 0,
        });
    }

    if stage == Stage::Vertex {
        let inputs = module
            .entry_points
            .iter()
            .filter(|ep| ep.stage == ShaderStage::Vertex)
            .flat_map(|ep| ep.function.arguments.iter());
        for arg in inputs {
            if let (Some(name), Some(Binding::Location { location, .. })) =
                (&arg.name, &arg.binding)
            {
                reflection.stage_inputs.push(StageInput {
                    name: name.clone(),
                    location: *location,
                });
            }
        }
        reflection.stage_inputs.sort_by_key(|input| input.location);
    }

    Ok(reflection)
}

fn member_type(module: &Module, ty: Handle<Type>) -> ReflectResult<MemberType> {
    match module.types[ty].inner {
        TypeInner::Scalar(scalar) => Ok(MemberType {
            base: base_type(scalar.kind, scalar.width)?,
            vecsize: 1,
            columns: 1,
            array: Vec::new(),
        }),
        TypeInner::Vector { size, scalar } => Ok(MemberType {
            base: base_type(scalar.kind, scalar.width)?,
            vecsize: size as u8,
            columns: 1,
            array: Vec::new(),
        }),
        TypeInner::Matrix { columns, rows, scalar } => Ok(MemberType {
            base: base_type(scalar.kind, scalar.width)?,
            vecsize: rows as u8,
            columns: columns as u8,
            array: Vec::new(),
        }),
        TypeInner::Array { base, size, .. } => {
            let ArraySize::Constant(count) = size else {
                return Err("uniform arrays need a constant size".to_string());
            };
            let mut element = member_type(module, base)?;
            element.array.insert(0, count.get());
            Ok(element)
        }
        ref other => Err(format!("uniform block member of type {other:?} cannot be reflected")),
    }
}

fn base_type(kind: ScalarKind, width: u8) -> ReflectResult<BaseType> {
    match kind {
        ScalarKind::Float if width == 8 => Ok(BaseType::Double),
        ScalarKind::Float => Ok(BaseType::Float),
        ScalarKind::Sint => Ok(BaseType::Int),
        ScalarKind::Uint => Ok(BaseType::UInt),
        ScalarKind::Bool => Ok(BaseType::Bool),
        other => Err(format!("{other:?} scalars cannot be reflected")),
    }
}
