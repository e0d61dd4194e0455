//! In-memory backend.
//!
//! Behaves like the real backend where the engine can observe it: shader
//! containers are parsed with the same codec, uniforms are registered by name
//! and shared between shaders, ids are small integers reused after destroy, and
//! per-draw bindings are consumed by `submit`. Nothing is rasterized; every
//! submit is recorded instead, and `frame` retires the records of the frame it
//! presents.

use std::collections::{BTreeMap, HashMap};

use crate::error::{EngineError, Result};
use crate::shader::ShaderBinary;

use super::{
    uniform_base_type, Backend, IndexBufferId, ProgramId, ShaderId, TextureDesc, TextureId,
    UniformId, UniformInfo, VertexBufferId, VertexLayout, STATE_DEFAULT,
};

/// Small-integer id allocator with reuse.
#[derive(Debug)]
struct Objects<V> {
    live: BTreeMap<u16, V>,
    free: Vec<u16>,
    next: u16,
}

impl<V> Objects<V> {
    fn new() -> Self {
        Self {
            live: BTreeMap::new(),
            free: Vec::new(),
            next: 0,
        }
    }

    fn insert(&mut self, value: V) -> u16 {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                assert!(self.next < u16::MAX, "backend id space exhausted");
                let id = self.next;
                self.next += 1;
                id
            }
        };
        self.live.insert(id, value);
        id
    }

    fn get(&self, id: u16) -> Option<&V> {
        self.live.get(&id)
    }

    fn get_mut(&mut self, id: u16) -> Option<&mut V> {
        self.live.get_mut(&id)
    }

    fn remove(&mut self, id: u16) -> Option<V> {
        let value = self.live.remove(&id)?;
        self.free.push(id);
        Some(value)
    }

    fn len(&self) -> usize {
        self.live.len()
    }
}

#[derive(Debug)]
struct ShaderEntry {
    binary: ShaderBinary,
    uniforms: Vec<UniformId>,
}

#[derive(Debug)]
struct UniformEntry {
    info: UniformInfo,
    refs: u32,
    value: Vec<f32>,
}

/// A texture as uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessTexture {
    pub desc: TextureDesc,
    pub cube: bool,
    pub data: Vec<u8>,
}

/// Everything bound for one `submit`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Frame the draw belongs to (number of frames presented before it).
    pub frame: u32,
    pub view: u16,
    pub program: ProgramId,
    pub state: u64,
    pub index_buffer: Option<IndexBufferId>,
    /// `(stream, buffer)` in stream order.
    pub vertex_buffers: Vec<(u8, VertexBufferId)>,
    /// `(stage, sampler, texture)` in stage order.
    pub textures: Vec<(u8, UniformId, TextureId)>,
    /// Latest value of every uniform the program's shaders use.
    pub uniforms: Vec<(String, Vec<f32>)>,
}

#[derive(Debug, Default)]
struct Bindings {
    index_buffer: Option<IndexBufferId>,
    vertex_buffers: BTreeMap<u8, VertexBufferId>,
    textures: BTreeMap<u8, (UniformId, TextureId)>,
    state: Option<u64>,
}

/// View clear parameters as set by `set_view_clear`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewClear {
    pub flags: u16,
    pub rgba: u32,
    pub depth: f32,
    pub stencil: u8,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    shaders: Objects<ShaderEntry>,
    programs: Objects<(ShaderId, ShaderId)>,
    uniforms: Objects<UniformEntry>,
    uniform_names: HashMap<String, UniformId>,
    vertex_buffers: Objects<(Vec<u8>, VertexLayout)>,
    index_buffers: Objects<(Vec<u8>, u16)>,
    textures: Objects<HeadlessTexture>,

    bindings: Bindings,
    /// Draws of the frame in progress.
    draws: Vec<DrawRecord>,
    /// Draws of the most recently presented frame.
    presented: Vec<DrawRecord>,
    submitted: u64,
    frames: u32,

    view_clear: BTreeMap<u16, ViewClear>,
    view_rect: BTreeMap<u16, [u16; 4]>,
    resolution: (u32, u32, u32),
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            shaders: Objects::new(),
            programs: Objects::new(),
            uniforms: Objects::new(),
            uniform_names: HashMap::new(),
            vertex_buffers: Objects::new(),
            index_buffers: Objects::new(),
            textures: Objects::new(),
            bindings: Bindings::default(),
            draws: Vec::new(),
            presented: Vec::new(),
            submitted: 0,
            frames: 0,
            view_clear: BTreeMap::new(),
            view_rect: BTreeMap::new(),
            resolution: (0, 0, 0),
        }
    }

    // ── inspection ────────────────────────────────────────────────────────

    /// The parsed container a shader was created from.
    pub fn shader(&self, shader: ShaderId) -> Option<&ShaderBinary> {
        self.shaders.get(shader.0).map(|s| &s.binary)
    }

    pub fn program_shaders(&self, program: ProgramId) -> Option<(ShaderId, ShaderId)> {
        self.programs.get(program.0).copied()
    }

    pub fn texture(&self, texture: TextureId) -> Option<&HeadlessTexture> {
        self.textures.get(texture.0)
    }

    pub fn vertex_buffer(&self, buffer: VertexBufferId) -> Option<(&[u8], &VertexLayout)> {
        self.vertex_buffers
            .get(buffer.0)
            .map(|(data, layout)| (data.as_slice(), layout))
    }

    /// Index bytes and creation flags.
    pub fn index_buffer(&self, buffer: IndexBufferId) -> Option<(&[u8], u16)> {
        self.index_buffers
            .get(buffer.0)
            .map(|(data, flags)| (data.as_slice(), *flags))
    }

    /// Latest value written to the uniform called `name`.
    pub fn uniform_value(&self, name: &str) -> Option<&[f32]> {
        let id = self.uniform_names.get(name)?;
        self.uniforms.get(id.0).map(|u| u.value.as_slice())
    }

    /// Draws submitted since the last `frame`.
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Draws of the last presented frame.
    pub fn presented_draws(&self) -> &[DrawRecord] {
        &self.presented
    }

    /// Number of draws submitted since creation.
    pub fn submitted_draws(&self) -> u64 {
        self.submitted
    }

    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    pub fn view_clear(&self, view: u16) -> Option<ViewClear> {
        self.view_clear.get(&view).copied()
    }

    /// `[x, y, width, height]` of a view.
    pub fn view_rect(&self, view: u16) -> Option<[u16; 4]> {
        self.view_rect.get(&view).copied()
    }

    /// `(width, height, flags)` of the last reset.
    pub fn resolution(&self) -> (u32, u32, u32) {
        self.resolution
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_uniforms(&self) -> usize {
        self.uniforms.len()
    }

    pub fn live_vertex_buffers(&self) -> usize {
        self.vertex_buffers.len()
    }

    pub fn live_index_buffers(&self) -> usize {
        self.index_buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Total backend objects alive, uniforms excluded.
    pub fn live_objects(&self) -> usize {
        self.live_shaders()
            + self.live_programs()
            + self.live_vertex_buffers()
            + self.live_index_buffers()
            + self.live_textures()
    }

    fn register_uniform(&mut self, name: &str, tag: u8, num: u16) -> Result<UniformId> {
        let kind = uniform_base_type(tag);

        let existing = self
            .uniform_names
            .get(name)
            .and_then(|&id| Some((id, self.uniforms.get_mut(id.0)?)));

        if let Some((id, entry)) = existing {
            if entry.info.kind != kind {
                return Err(EngineError::MalformedShader(format!(
                    "uniform `{name}` redeclared with type {kind} (was {})",
                    entry.info.kind
                )));
            }
            entry.refs += 1;
            return Ok(id);
        }

        let id = UniformId(self.uniforms.insert(UniformEntry {
            info: UniformInfo {
                name: name.to_string(),
                kind,
                num,
            },
            refs: 1,
            value: Vec::new(),
        }));
        self.uniform_names.insert(name.to_string(), id);
        Ok(id)
    }

    fn release_uniform(&mut self, id: UniformId) {
        let Some(entry) = self.uniforms.get_mut(id.0) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            if let Some(entry) = self.uniforms.remove(id.0) {
                self.uniform_names.remove(&entry.info.name);
            }
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HeadlessBackend {
    fn create_shader(&mut self, bytes: &[u8]) -> Result<ShaderId> {
        let binary = ShaderBinary::decode(bytes)?;

        let mut uniforms = Vec::with_capacity(binary.uniforms.len());
        for record in &binary.uniforms {
            match self.register_uniform(&record.name, record.type_tag, record.num.max(1) as u16) {
                Ok(id) => uniforms.push(id),
                Err(err) => {
                    for id in uniforms {
                        self.release_uniform(id);
                    }
                    return Err(err);
                }
            }
        }

        let id = ShaderId(self.shaders.insert(ShaderEntry { binary, uniforms }));
        log::trace!("headless: shader {} created ({} bytes)", id.0, bytes.len());
        Ok(id)
    }

    fn shader_uniforms(&self, shader: ShaderId) -> Vec<UniformId> {
        self.shaders
            .get(shader.0)
            .map(|s| s.uniforms.clone())
            .unwrap_or_default()
    }

    fn uniform_info(&self, uniform: UniformId) -> UniformInfo {
        match self.uniforms.get(uniform.0) {
            Some(entry) => entry.info.clone(),
            None => panic!("uniform {} is not alive", uniform.0),
        }
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        if let Some(entry) = self.shaders.remove(shader.0) {
            for id in entry.uniforms {
                self.release_uniform(id);
            }
        }
    }

    fn create_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> ProgramId {
        assert!(self.shaders.get(vertex.0).is_some(), "vertex shader {} is not alive", vertex.0);
        assert!(
            self.shaders.get(fragment.0).is_some(),
            "fragment shader {} is not alive",
            fragment.0
        );
        ProgramId(self.programs.insert((vertex, fragment)))
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.programs.remove(program.0);
    }

    fn create_vertex_buffer(&mut self, data: &[u8], layout: &VertexLayout) -> VertexBufferId {
        VertexBufferId(self.vertex_buffers.insert((data.to_vec(), layout.clone())))
    }

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferId) {
        self.vertex_buffers.remove(buffer.0);
    }

    fn create_index_buffer(&mut self, data: &[u8], flags: u16) -> IndexBufferId {
        IndexBufferId(self.index_buffers.insert((data.to_vec(), flags)))
    }

    fn destroy_index_buffer(&mut self, buffer: IndexBufferId) {
        self.index_buffers.remove(buffer.0);
    }

    fn create_texture_2d(&mut self, desc: TextureDesc, data: Vec<u8>) -> TextureId {
        TextureId(self.textures.insert(HeadlessTexture {
            desc,
            cube: false,
            data,
        }))
    }

    fn create_texture_cube(&mut self, desc: TextureDesc, data: Vec<u8>) -> TextureId {
        TextureId(self.textures.insert(HeadlessTexture {
            desc,
            cube: true,
            data,
        }))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture.0);
    }

    fn set_uniform(&mut self, uniform: UniformId, values: &[f32], num: u16) {
        let floats = (num as usize * 4).min(values.len());
        match self.uniforms.get_mut(uniform.0) {
            Some(entry) => entry.value = values[..floats].to_vec(),
            None => panic!("uniform {} is not alive", uniform.0),
        }
    }

    fn set_texture(&mut self, stage: u8, sampler: UniformId, texture: TextureId) {
        self.bindings.textures.insert(stage, (sampler, texture));
    }

    fn set_index_buffer(&mut self, buffer: IndexBufferId) {
        self.bindings.index_buffer = Some(buffer);
    }

    fn set_vertex_buffer(&mut self, stream: u8, buffer: VertexBufferId) {
        self.bindings.vertex_buffers.insert(stream, buffer);
    }

    fn set_state(&mut self, state: u64) {
        self.bindings.state = Some(state);
    }

    fn set_view_clear(&mut self, view: u16, flags: u16, rgba: u32, depth: f32, stencil: u8) {
        self.view_clear.insert(
            view,
            ViewClear {
                flags,
                rgba,
                depth,
                stencil,
            },
        );
    }

    fn set_view_rect(&mut self, view: u16, x: u16, y: u16, width: u16, height: u16) {
        self.view_rect.insert(view, [x, y, width, height]);
    }

    fn reset(&mut self, width: u32, height: u32, flags: u32) {
        self.resolution = (width, height, flags);
    }

    fn submit(&mut self, view: u16, program: ProgramId) {
        let (vs, fs) = match self.programs.get(program.0) {
            Some(shaders) => *shaders,
            None => panic!("program {} is not alive", program.0),
        };

        let mut uniforms = Vec::new();
        for shader in [vs, fs] {
            for id in self.shader_uniforms(shader) {
                if let Some(entry) = self.uniforms.get(id.0) {
                    if !uniforms.iter().any(|(name, _)| name == &entry.info.name) {
                        uniforms.push((entry.info.name.clone(), entry.value.clone()));
                    }
                }
            }
        }

        let bindings = std::mem::take(&mut self.bindings);
        let record = DrawRecord {
            frame: self.frames,
            view,
            program,
            state: bindings.state.unwrap_or(STATE_DEFAULT),
            index_buffer: bindings.index_buffer,
            vertex_buffers: bindings.vertex_buffers.into_iter().collect(),
            textures: bindings
                .textures
                .into_iter()
                .map(|(stage, (sampler, texture))| (stage, sampler, texture))
                .collect(),
            uniforms,
        };
        log::trace!("headless: submit program {} to view {view}", program.0);
        self.draws.push(record);
        self.submitted += 1;
    }

    fn frame(&mut self) -> u32 {
        self.presented = std::mem::take(&mut self.draws);
        self.frames += 1;
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        TextureFormat, BUFFER_INDEX32, UNIFORM_FRAGMENT_BIT, UNIFORM_SAMPLER_BIT, UNIFORM_TYPE_MAT4,
        UNIFORM_TYPE_SAMPLER, UNIFORM_TYPE_VEC4,
    };
    use crate::shader::{Stage, UniformRecord};

    fn container(stage: Stage, uniforms: &[(&str, u8)]) -> Vec<u8> {
        ShaderBinary {
            stage,
            version: 6,
            outputs_hash: 0x0BAD_1DEA,
            inputs_hash: 0x0BAD_1DEA,
            uniforms: uniforms
                .iter()
                .map(|(name, tag)| UniformRecord {
                    name: name.to_string(),
                    type_tag: *tag,
                    num: 0,
                    offset: 0,
                    register_count: 1,
                })
                .collect(),
            bytecode: vec![1, 2, 3],
            attributes: Vec::new(),
            uniform_block_size: 16,
        }
        .encode()
    }

    #[test]
    fn uniforms_are_shared_by_name() {
        let mut backend = HeadlessBackend::new();
        let vs = backend
            .create_shader(&container(Stage::Vertex, &[("u_color", UNIFORM_TYPE_VEC4)]))
            .unwrap();
        let fs = backend
            .create_shader(&container(
                Stage::Fragment,
                &[("u_color", UNIFORM_TYPE_VEC4 | UNIFORM_FRAGMENT_BIT)],
            ))
            .unwrap();

        assert_eq!(backend.shader_uniforms(vs), backend.shader_uniforms(fs));
        assert_eq!(backend.live_uniforms(), 1);

        backend.destroy_shader(vs);
        assert_eq!(backend.live_uniforms(), 1);
        backend.destroy_shader(fs);
        assert_eq!(backend.live_uniforms(), 0);
    }

    #[test]
    fn conflicting_uniform_types_are_rejected() {
        let mut backend = HeadlessBackend::new();
        backend
            .create_shader(&container(Stage::Vertex, &[("m", UNIFORM_TYPE_MAT4)]))
            .unwrap();
        let err = backend
            .create_shader(&container(
                Stage::Fragment,
                &[("x", UNIFORM_TYPE_VEC4), ("m", UNIFORM_TYPE_VEC4)],
            ))
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedShader(_)));
        // the partially registered `x` was released again
        assert_eq!(backend.live_uniforms(), 1);
        assert_eq!(backend.live_shaders(), 1);
    }

    #[test]
    fn uniform_info_strips_stage_bits() {
        let mut backend = HeadlessBackend::new();
        let fs = backend
            .create_shader(&container(
                Stage::Fragment,
                &[("tex", UNIFORM_TYPE_SAMPLER | UNIFORM_SAMPLER_BIT)],
            ))
            .unwrap();
        let id = backend.shader_uniforms(fs)[0];
        let info = backend.uniform_info(id);
        assert_eq!(info.name, "tex");
        assert_eq!(info.kind, UNIFORM_TYPE_SAMPLER);
    }

    #[test]
    fn malformed_containers_are_rejected() {
        let mut backend = HeadlessBackend::new();
        assert!(backend.create_shader(b"VSH\x06").is_err());
        assert_eq!(backend.live_shaders(), 0);
    }

    #[test]
    fn ids_are_reused_after_destroy() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_index_buffer(&[0, 0], 0);
        let _b = backend.create_index_buffer(&[0, 0], 0);
        backend.destroy_index_buffer(a);
        let c = backend.create_index_buffer(&[0, 0, 0, 0], BUFFER_INDEX32);
        assert_eq!(a, c);
        assert_eq!(backend.index_buffer(c).unwrap().1, BUFFER_INDEX32);
    }

    #[test]
    fn submit_consumes_bindings() {
        let mut backend = HeadlessBackend::new();
        let vs = backend
            .create_shader(&container(Stage::Vertex, &[("u", UNIFORM_TYPE_VEC4)]))
            .unwrap();
        let fs = backend.create_shader(&container(Stage::Fragment, &[])).unwrap();
        let program = backend.create_program(vs, fs);
        let ib = backend.create_index_buffer(&[0, 0], 0);
        let vb = backend.create_vertex_buffer(&[0; 12], &VertexLayout::new(12));
        let tex = backend.create_texture_2d(
            TextureDesc {
                width: 1,
                height: 1,
                has_mips: false,
                num_layers: 1,
                format: TextureFormat::Rgba8,
                flags: 0,
            },
            vec![0; 4],
        );
        let u = backend.shader_uniforms(vs)[0];

        backend.set_uniform(u, &[1.0, 2.0, 3.0, 4.0], 1);
        backend.set_index_buffer(ib);
        backend.set_vertex_buffer(0, vb);
        backend.set_texture(2, u, tex);
        backend.set_state(42);
        backend.submit(0, program);
        backend.submit(0, program);

        let draws = backend.draws();
        assert_eq!(draws[0].index_buffer, Some(ib));
        assert_eq!(draws[0].vertex_buffers, vec![(0, vb)]);
        assert_eq!(draws[0].textures, vec![(2, u, tex)]);
        assert_eq!(draws[0].state, 42);
        assert_eq!(draws[0].uniforms, vec![("u".to_string(), vec![1.0, 2.0, 3.0, 4.0])]);

        assert_eq!(draws[1].index_buffer, None);
        assert_eq!(draws[1].state, STATE_DEFAULT);
        // uniform values persist across submits
        assert_eq!(backend.uniform_value("u"), Some(&[1.0, 2.0, 3.0, 4.0][..]));
    }

    #[test]
    fn frame_numbers_advance() {
        let mut backend = HeadlessBackend::new();
        assert_eq!(backend.frame(), 1);
        assert_eq!(backend.frame(), 2);
        assert_eq!(backend.frame_count(), 2);
    }

    #[test]
    fn draw_records_reset_every_frame() {
        let mut backend = HeadlessBackend::new();
        let vs = backend.create_shader(&container(Stage::Vertex, &[])).unwrap();
        let fs = backend.create_shader(&container(Stage::Fragment, &[])).unwrap();
        let program = backend.create_program(vs, fs);

        backend.submit(0, program);
        backend.submit(0, program);
        assert_eq!(backend.draws().len(), 2);
        backend.frame();
        assert!(backend.draws().is_empty());
        assert_eq!(backend.presented_draws().len(), 2);

        backend.submit(0, program);
        backend.frame();
        assert_eq!(backend.presented_draws().len(), 1);
        assert_eq!(backend.presented_draws()[0].frame, 1);
        backend.frame();
        assert!(backend.presented_draws().is_empty());
        assert_eq!(backend.submitted_draws(), 3);
    }
}
