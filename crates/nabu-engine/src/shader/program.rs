use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::backend::{Backend, ProgramId, ShaderId, UniformId};
use crate::config::ShaderBinaryConfig;
use crate::error::{EngineError, Result};
use crate::handle::Handle;

use super::compiler::ShaderCompiler;
use super::container::ShaderBinary;
use super::reflect::{reflect_stage, UniformDescriptor};
use super::Stage;

pub type ProgramHandle = Handle<ProgramData>;

/// Negates every `dFdy(` call.
///
/// Screen-space Y runs the other way on the backend, so vertical derivatives
/// flip sign.
pub fn patch_fragment_source(source: &str) -> Cow<'_, str> {
    static DFDY: OnceLock<Regex> = OnceLock::new();
    let re = DFDY.get_or_init(|| Regex::new(r"dFdy\(").expect("valid dFdy pattern"));
    re.replace_all(source, "-dFdy(")
}

/// A reflected uniform and the backend handle registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformData {
    pub descriptor: UniformDescriptor,
    pub handle: UniformId,
}

/// Uniform table of one stage, in container order.
#[derive(Debug, Clone, Default)]
pub struct StageUniforms {
    entries: Vec<UniformData>,
    by_name: HashMap<String, u16>,
}

impl StageUniforms {
    pub fn new(entries: Vec<UniformData>) -> Self {
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, u)| (u.descriptor.name.clone(), i as u16))
            .collect();
        Self { entries, by_name }
    }

    pub fn get(&self, index: u16) -> Option<&UniformData> {
        self.entries.get(index as usize)
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn find(&self, name: &str) -> Option<&UniformData> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniformData> {
        self.entries.iter()
    }
}

/// Reference to one cached uniform of a live program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformRef {
    pub program: ProgramHandle,
    pub stage: Stage,
    pub index: u16,
}

/// Backend objects and name lookups of one linked program.
#[derive(Debug)]
pub struct ProgramData {
    pub vertex_shader: ShaderId,
    pub fragment_shader: ShaderId,
    pub program: ProgramId,
    pub vertex_uniforms: StageUniforms,
    pub fragment_uniforms: StageUniforms,
    pub attribute_locations: HashMap<String, u32>,
}

impl ProgramData {
    /// Compiles, encodes and links a vertex/fragment pair.
    ///
    /// Reflection and encoding of both stages complete before the backend is
    /// touched, so an unsupported uniform leaves no backend object behind.
    pub fn compile<B: Backend + ?Sized>(
        backend: &mut B,
        compiler: &dyn ShaderCompiler,
        vertex_source: &str,
        fragment_source: &str,
        config: &ShaderBinaryConfig,
    ) -> Result<Self> {
        let fragment_source = patch_fragment_source(fragment_source);
        let (vs, fs) = compiler.compile(vertex_source, &fragment_source)?;

        let vs_reflection = reflect_stage(Stage::Vertex, &vs.reflection)?;
        let fs_reflection = reflect_stage(Stage::Fragment, &fs.reflection)?;

        let vs_bytes =
            ShaderBinary::from_reflection(Stage::Vertex, &vs_reflection, vs.bytecode, config)?
                .encode();
        let fs_bytes =
            ShaderBinary::from_reflection(Stage::Fragment, &fs_reflection, fs.bytecode, config)?
                .encode();
        log::trace!(
            "shader containers encoded: vertex {} bytes, fragment {} bytes",
            vs_bytes.len(),
            fs_bytes.len()
        );

        let vertex_shader = backend.create_shader(&vs_bytes)?;
        let fragment_shader = match backend.create_shader(&fs_bytes) {
            Ok(id) => id,
            Err(err) => {
                backend.destroy_shader(vertex_shader);
                return Err(err);
            }
        };

        let resolved = resolve_uniforms(backend, vertex_shader, vs_reflection.uniforms)
            .and_then(|v| {
                resolve_uniforms(backend, fragment_shader, fs_reflection.uniforms).map(|f| (v, f))
            });
        let (vertex_uniforms, fragment_uniforms) = match resolved {
            Ok(tables) => tables,
            Err(err) => {
                backend.destroy_shader(vertex_shader);
                backend.destroy_shader(fragment_shader);
                return Err(err);
            }
        };

        let program = backend.create_program(vertex_shader, fragment_shader);

        let attribute_locations: HashMap<String, u32> = vs_reflection
            .attributes
            .into_iter()
            .map(|a| (a.name, a.location))
            .collect();

        log::debug!(
            "program {} linked: {} vertex uniform(s), {} fragment uniform(s), {} attribute(s)",
            program.idx(),
            vertex_uniforms.len(),
            fragment_uniforms.len(),
            attribute_locations.len()
        );

        Ok(Self {
            vertex_shader,
            fragment_shader,
            program,
            vertex_uniforms,
            fragment_uniforms,
            attribute_locations,
        })
    }

    pub fn stage_uniforms(&self, stage: Stage) -> &StageUniforms {
        match stage {
            Stage::Vertex => &self.vertex_uniforms,
            Stage::Fragment => &self.fragment_uniforms,
        }
    }

    /// Finds a uniform by name; the vertex stage wins when both declare it.
    pub fn lookup_uniform(&self, name: &str) -> Option<(Stage, u16)> {
        self.vertex_uniforms
            .index_of(name)
            .map(|i| (Stage::Vertex, i))
            .or_else(|| self.fragment_uniforms.index_of(name).map(|i| (Stage::Fragment, i)))
    }

    /// Declared location of a vertex input, or -1.
    pub fn attribute_location(&self, name: &str) -> i32 {
        self.attribute_locations
            .get(name)
            .map_or(-1, |&location| location as i32)
    }

    /// Releases the program and both shaders.
    pub fn destroy<B: Backend + ?Sized>(self, backend: &mut B) {
        backend.destroy_program(self.program);
        backend.destroy_shader(self.vertex_shader);
        backend.destroy_shader(self.fragment_shader);
    }
}

fn resolve_uniforms<B: Backend + ?Sized>(
    backend: &B,
    shader: ShaderId,
    descriptors: Vec<UniformDescriptor>,
) -> Result<StageUniforms> {
    let registered: HashMap<String, UniformId> = backend
        .shader_uniforms(shader)
        .into_iter()
        .map(|id| (backend.uniform_info(id).name, id))
        .collect();

    let entries = descriptors
        .into_iter()
        .map(|descriptor| match registered.get(&descriptor.name) {
            Some(&handle) => Ok(UniformData { descriptor, handle }),
            None => Err(EngineError::MalformedShader(format!(
                "backend did not register uniform `{}`",
                descriptor.name
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StageUniforms::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::shader::{GlslCompiler, UniformKind};

    const VS: &str = "#version 450
        layout(std140, set = 0, binding = 0) uniform Transform { mat4 world; vec4 eyePosition; };
        layout(location = 0) in vec3 position;
        layout(location = 10) in vec2 uv;
        layout(location = 0) out vec2 vUV;
        void main() { vUV = uv; gl_Position = world * vec4(position, 1.0) + eyePosition; }";
    const FS: &str = "#version 450
        layout(std140, set = 0, binding = 0) uniform Material { vec4 eyePosition; vec3 tint; };
        layout(set = 1, binding = 1) uniform texture2D diffuseTexture;
        layout(set = 2, binding = 1) uniform sampler diffuseTex;
        layout(location = 0) in vec2 vUV;
        layout(location = 0) out vec4 color;
        void main() {
            color = texture(sampler2D(diffuseTexture, diffuseTex), vUV) * eyePosition
                + vec4(tint, 0.0);
        }";

    // OpFNegate with its word count in the high half
    const OP_FNEGATE: u32 = 0x0004_007F;

    fn derivative_shader(call: &str) -> String {
        format!(
            "#version 450
             layout(std140, set = 0, binding = 0) uniform Material {{ vec4 tint; }};
             layout(location = 0) out vec4 color;
             void main() {{ color = vec4({call}(tint.x)); }}"
        )
    }

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }

    fn compile(backend: &mut HeadlessBackend, vs: &str, fs: &str) -> Result<ProgramData> {
        ProgramData::compile(backend, &GlslCompiler::new(), vs, fs, &ShaderBinaryConfig::default())
    }

    #[test]
    fn derivative_calls_are_negated() {
        let patched = patch_fragment_source("float a = dFdy(x) + dFdx(y) * dFdy (z);");
        assert_eq!(patched, "float a = -dFdy(x) + dFdx(y) * dFdy (z);");
        assert!(matches!(patch_fragment_source("no derivatives"), Cow::Borrowed(_)));
    }

    #[test]
    fn compile_resolves_every_uniform_and_attribute() {
        let mut backend = HeadlessBackend::new();
        let program = compile(&mut backend, VS, FS).unwrap();

        assert_eq!(program.vertex_uniforms.len(), 2);
        assert_eq!(program.fragment_uniforms.len(), 3);
        let sampler = program.fragment_uniforms.find("diffuseTex").unwrap();
        assert_eq!(sampler.descriptor.kind, UniformKind::Sampler);
        assert_eq!(sampler.descriptor.slot, Some(1));
        assert_eq!(backend.uniform_info(sampler.handle).name, "diffuseTex");

        assert_eq!(program.attribute_location("uv"), 10);
        assert_eq!(program.attribute_location("normal"), -1);
        assert_eq!(backend.live_programs(), 1);
        assert_eq!(backend.live_shaders(), 2);
    }

    #[test]
    fn vertex_stage_wins_lookup() {
        let mut backend = HeadlessBackend::new();
        let program = compile(&mut backend, VS, FS).unwrap();
        assert_eq!(program.lookup_uniform("eyePosition").map(|(s, _)| s), Some(Stage::Vertex));
        assert_eq!(program.lookup_uniform("tint").map(|(s, _)| s), Some(Stage::Fragment));
        assert_eq!(program.lookup_uniform("missing"), None);
    }

    #[test]
    fn patched_source_reaches_the_backend() {
        let mut backend = HeadlessBackend::new();
        let program = compile(&mut backend, VS, &derivative_shader("dFdy")).unwrap();
        let binary = backend.shader(program.fragment_shader).unwrap();
        assert!(words(&binary.bytecode).contains(&OP_FNEGATE));

        let program = compile(&mut backend, VS, &derivative_shader("dFdx")).unwrap();
        let binary = backend.shader(program.fragment_shader).unwrap();
        assert!(!words(&binary.bytecode).contains(&OP_FNEGATE));
    }

    #[test]
    fn unsupported_uniform_creates_nothing() {
        let mut backend = HeadlessBackend::new();
        let vs = "#version 450
            layout(std140, set = 0, binding = 0) uniform Transform { mat3 normalMatrix; };
            void main() { gl_Position = vec4(normalMatrix[0], 1.0); }";
        let err = compile(&mut backend, vs, FS).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedUniform { .. }));
        assert_eq!(backend.live_objects(), 0);
        assert_eq!(backend.live_uniforms(), 0);
    }

    #[test]
    fn conflicting_backend_registration_cleans_up() {
        let mut backend = HeadlessBackend::new();
        // same name, different backend type in the two stages
        let vs = "#version 450
            layout(std140, set = 0, binding = 0) uniform Globals { mat4 m; };
            void main() { gl_Position = m[0]; }";
        let fs = "#version 450
            layout(std140, set = 0, binding = 0) uniform Globals { vec4 m; };
            layout(location = 0) out vec4 color;
            void main() { color = m; }";
        let err = compile(&mut backend, vs, fs).unwrap_err();
        assert!(matches!(err, EngineError::MalformedShader(_)));
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn destroy_releases_program_and_shaders() {
        let mut backend = HeadlessBackend::new();
        let program = compile(&mut backend, VS, FS).unwrap();
        program.destroy(&mut backend);
        assert_eq!(backend.live_objects(), 0);
        assert_eq!(backend.live_uniforms(), 0);
    }
}
