//! Typed boundary for a scripting front-end.
//!
//! A [`Command`] carries arguments roughly as a script hands them over (WebGL
//! type codes, loose `u32`s, float vectors). [`RenderContext::execute`]
//! validates and converts them before calling the typed API, so malformed
//! input comes back as an [`EngineError`] instead of reaching the core.

use crate::backend::Backend;
use crate::context::RenderContext;
use crate::error::{EngineError, Result};
use crate::geometry::{
    attrib_type_from_gl, IndexBufferHandle, IndexData, IndexFormat, VertexArrayHandle,
    VertexAttributeDesc, VertexBufferHandle,
};
use crate::shader::{ProgramHandle, UniformRef};
use crate::texture::TextureHandle;

/// Vertex attribute as described by the script layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeArgs {
    pub location: u32,
    pub count: u32,
    /// WebGL component type code.
    pub gl_type: u32,
    pub normalized: bool,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateProgram { vertex: String, fragment: String },
    GetUniforms { program: ProgramHandle, names: Vec<String> },
    GetAttributes { program: ProgramHandle, names: Vec<String> },
    SetProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),

    SetState { culling: bool, z_offset: f32, reverse_side: bool },
    SetBlendMode(i32),
    SetZOffset(f32),
    GetZOffset,
    SetDepthTest(bool),
    SetDepthWrite(bool),
    GetDepthWrite,
    SetColorWrite(bool),

    SetMatrix { uniform: UniformRef, values: Vec<f32> },
    SetMatrices { uniform: UniformRef, values: Vec<f32> },
    SetFloat { uniform: UniformRef, x: f32 },
    SetFloat2 { uniform: UniformRef, x: f32, y: f32 },
    SetFloat3 { uniform: UniformRef, x: f32, y: f32, z: f32 },
    SetFloat4 { uniform: UniformRef, x: f32, y: f32, z: f32, w: f32 },
    SetFloatArray { uniform: UniformRef, values: Vec<f32> },

    CreateVertexBuffer { bytes: Vec<u8>, stride: u32, attributes: Vec<AttributeArgs> },
    DeleteVertexBuffer(VertexBufferHandle),
    /// `element_type` is a WebGL index type code.
    CreateIndexBuffer { bytes: Vec<u8>, element_type: u32 },
    DeleteIndexBuffer(IndexBufferHandle),
    CreateVertexArray,
    RecordIndexBuffer { array: VertexArrayHandle, buffer: IndexBufferHandle },
    RecordVertexBuffer { array: VertexArrayHandle, buffer: VertexBufferHandle },
    BindVertexArray(VertexArrayHandle),
    DeleteVertexArray(VertexArrayHandle),

    CreateTexture,
    LoadTexture { texture: TextureHandle, bytes: Vec<u8>, generate_mips: bool },
    /// `levels[mip][face]` encoded images.
    LoadCubeTexture { texture: TextureHandle, levels: Vec<Vec<Vec<u8>>>, flip_y: bool },
    GetTextureWidth(TextureHandle),
    GetTextureHeight(TextureHandle),
    SetTextureSampling { texture: TextureHandle, filter: u32 },
    SetTextureWrapMode { texture: TextureHandle, u: u32, v: u32, w: u32 },
    SetTextureAnisotropicLevel { texture: TextureHandle, level: u32 },
    SetTexture { uniform: UniformRef, texture: TextureHandle },
    DeleteTexture(TextureHandle),

    DrawIndexed { fill_mode: i32, start: u32, count: u32 },
    Draw { fill_mode: i32, start: u32, count: u32 },
    Clear { color: [f32; 4], backbuffer: bool, depth: bool, stencil: bool },
    UpdateSize { width: f32, height: f32 },
    GetRenderWidth,
    GetRenderHeight,
    Suspend,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Unit,
    Program(ProgramHandle),
    Uniforms(Vec<Option<UniformRef>>),
    Attributes(Vec<i32>),
    VertexBuffer(VertexBufferHandle),
    IndexBuffer(IndexBufferHandle),
    VertexArray(VertexArrayHandle),
    Texture(TextureHandle),
    Size(u32),
    ZOffset(f32),
    DepthWrite(bool),
}

impl<B: Backend> RenderContext<B> {
    /// Validates `command` and runs it.
    ///
    /// # Panics
    /// Contract violations of the underlying operation (stale handles, no bound
    /// program) panic exactly as the typed call does.
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        use Command as C;

        let reply = match command {
            C::CreateProgram { vertex, fragment } => {
                Reply::Program(self.create_program(&vertex, &fragment)?)
            }
            C::GetUniforms { program, names } => {
                Reply::Uniforms(self.get_uniforms(program, &names))
            }
            C::GetAttributes { program, names } => {
                Reply::Attributes(self.get_attributes(program, &names))
            }
            C::SetProgram(program) => {
                self.set_program(program);
                Reply::Unit
            }
            C::DeleteProgram(program) => {
                self.delete_program(program);
                Reply::Unit
            }

            C::SetState { culling, z_offset, reverse_side } => {
                self.set_state(culling, z_offset, reverse_side);
                Reply::Unit
            }
            C::SetBlendMode(mode) => {
                self.set_blend_mode(mode)?;
                Reply::Unit
            }
            C::SetZOffset(offset) => {
                self.set_z_offset(offset);
                Reply::Unit
            }
            C::GetZOffset => Reply::ZOffset(self.z_offset()),
            C::SetDepthTest(enable) => {
                self.set_depth_test(enable);
                Reply::Unit
            }
            C::SetDepthWrite(enable) => {
                self.set_depth_write(enable);
                Reply::Unit
            }
            C::GetDepthWrite => Reply::DepthWrite(self.depth_write()),
            C::SetColorWrite(enable) => {
                self.set_color_write(enable);
                Reply::Unit
            }

            C::SetMatrix { uniform, values } => {
                let matrix: [f32; 16] = values.as_slice().try_into().map_err(|_| {
                    EngineError::InvalidArgument(format!(
                        "matrix needs 16 floats, got {}",
                        values.len()
                    ))
                })?;
                self.set_matrix(uniform, &matrix);
                Reply::Unit
            }
            C::SetMatrices { uniform, values } => {
                self.set_matrices(uniform, &values)?;
                Reply::Unit
            }
            C::SetFloat { uniform, x } => {
                self.set_float(uniform, x);
                Reply::Unit
            }
            C::SetFloat2 { uniform, x, y } => {
                self.set_float2(uniform, x, y);
                Reply::Unit
            }
            C::SetFloat3 { uniform, x, y, z } => {
                self.set_float3(uniform, x, y, z);
                Reply::Unit
            }
            C::SetFloat4 { uniform, x, y, z, w } => {
                self.set_float4(uniform, x, y, z, w);
                Reply::Unit
            }
            C::SetFloatArray { uniform, values } => {
                self.set_float_array(uniform, &values)?;
                Reply::Unit
            }

            C::CreateVertexBuffer { bytes, stride, attributes } => {
                let stride = narrow::<u16>(stride, "vertex stride")?;
                let attributes = attributes
                    .iter()
                    .map(convert_attribute)
                    .collect::<Result<Vec<_>>>()?;
                Reply::VertexBuffer(self.create_vertex_buffer(&bytes, stride, &attributes)?)
            }
            C::DeleteVertexBuffer(buffer) => {
                self.delete_vertex_buffer(buffer);
                Reply::Unit
            }
            C::CreateIndexBuffer { bytes, element_type } => {
                let indices = IndexData::from_bytes(IndexFormat::from_gl(element_type)?, &bytes)?;
                Reply::IndexBuffer(self.create_index_buffer(&indices))
            }
            C::DeleteIndexBuffer(buffer) => {
                self.delete_index_buffer(buffer);
                Reply::Unit
            }
            C::CreateVertexArray => Reply::VertexArray(self.create_vertex_array()),
            C::RecordIndexBuffer { array, buffer } => {
                self.record_index_buffer(array, buffer);
                Reply::Unit
            }
            C::RecordVertexBuffer { array, buffer } => {
                self.record_vertex_buffer(array, buffer);
                Reply::Unit
            }
            C::BindVertexArray(array) => {
                self.bind_vertex_array(array);
                Reply::Unit
            }
            C::DeleteVertexArray(array) => {
                self.delete_vertex_array(array);
                Reply::Unit
            }

            C::CreateTexture => Reply::Texture(self.create_texture()),
            C::LoadTexture { texture, bytes, generate_mips } => {
                self.load_texture(texture, &bytes, generate_mips)?;
                Reply::Unit
            }
            C::LoadCubeTexture { texture, levels, flip_y } => {
                self.load_cube_texture(texture, &levels, flip_y)?;
                Reply::Unit
            }
            C::GetTextureWidth(texture) => Reply::Size(self.texture_width(texture)),
            C::GetTextureHeight(texture) => Reply::Size(self.texture_height(texture)),
            C::SetTextureSampling { texture, filter } => {
                self.set_texture_sampling(texture, filter);
                Reply::Unit
            }
            C::SetTextureWrapMode { texture, u, v, w } => {
                self.set_texture_wrap_mode(texture, u, v, w);
                Reply::Unit
            }
            C::SetTextureAnisotropicLevel { texture, level } => {
                self.set_texture_anisotropic_level(texture, level);
                Reply::Unit
            }
            C::SetTexture { uniform, texture } => {
                self.set_texture(uniform, texture);
                Reply::Unit
            }
            C::DeleteTexture(texture) => {
                self.delete_texture(texture);
                Reply::Unit
            }

            C::DrawIndexed { fill_mode, start, count } => {
                self.draw_indexed(fill_mode, start, count);
                Reply::Unit
            }
            C::Draw { fill_mode, start, count } => {
                self.draw(fill_mode, start, count);
                Reply::Unit
            }
            C::Clear { color, backbuffer, depth, stencil } => {
                self.clear(color, backbuffer, depth, stencil);
                Reply::Unit
            }
            C::UpdateSize { width, height } => {
                self.update_size(width, height);
                Reply::Unit
            }
            C::GetRenderWidth => Reply::Size(self.render_width()),
            C::GetRenderHeight => Reply::Size(self.render_height()),
            C::Suspend => {
                self.suspend();
                Reply::Unit
            }
        };

        Ok(reply)
    }
}

fn narrow<T: TryFrom<u32>>(value: u32, what: &str) -> Result<T> {
    T::try_from(value)
        .map_err(|_| EngineError::InvalidArgument(format!("{what} {value} is out of range")))
}

fn convert_attribute(args: &AttributeArgs) -> Result<VertexAttributeDesc> {
    Ok(VertexAttributeDesc {
        location: args.location,
        count: narrow::<u8>(args.count, "attribute component count")?,
        kind: attrib_type_from_gl(args.gl_type)?,
        normalized: args.normalized,
        offset: narrow::<u16>(args.offset, "attribute offset")?,
    })
}
