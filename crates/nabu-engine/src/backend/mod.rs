//! GPU backend collaborator.
//!
//! The engine talks to the GPU through [`Backend`], a handle-based immediate
//! API: objects are addressed by small integer ids that the backend reuses
//! after destruction, and per-draw bindings are consumed by `submit`.
//!
//! Flag constants reproduce the backend's bit layout exactly; they are shared
//! by every implementation.

mod headless;
mod layout;

pub use headless::{DrawRecord, HeadlessBackend, HeadlessTexture, ViewClear};
pub use layout::{Attrib, AttribType, LayoutAttribute, VertexLayout};

use crate::error::Result;

// ── ids ───────────────────────────────────────────────────────────────────

macro_rules! backend_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u16);

            impl $name {
                #[inline]
                pub const fn idx(self) -> u16 {
                    self.0
                }
            }
        )*
    };
}

backend_id!(
    /// Compiled shader stage.
    ShaderId,
    /// Linked vertex + fragment program.
    ProgramId,
    /// Named uniform registered by a shader.
    UniformId,
    TextureId,
    VertexBufferId,
    IndexBufferId,
);

// ── render state ──────────────────────────────────────────────────────────

pub const STATE_WRITE_R: u64 = 0x0000_0000_0000_0001;
pub const STATE_WRITE_G: u64 = 0x0000_0000_0000_0002;
pub const STATE_WRITE_B: u64 = 0x0000_0000_0000_0004;
pub const STATE_WRITE_A: u64 = 0x0000_0000_0000_0008;
pub const STATE_WRITE_RGB: u64 = STATE_WRITE_R | STATE_WRITE_G | STATE_WRITE_B;
pub const STATE_WRITE_Z: u64 = 0x0000_0040_0000_0000;
pub const STATE_DEPTH_TEST_LESS: u64 = 0x0000_0000_0000_0010;

pub const STATE_BLEND_ZERO: u64 = 0x0000_0000_0000_1000;
pub const STATE_BLEND_ONE: u64 = 0x0000_0000_0000_2000;
pub const STATE_BLEND_SRC_ALPHA: u64 = 0x0000_0000_0000_5000;
pub const STATE_BLEND_INV_SRC_ALPHA: u64 = 0x0000_0000_0000_6000;
pub const STATE_BLEND_MASK: u64 = 0x0000_0000_0fff_f000;

pub const STATE_CULL_CW: u64 = 0x0000_0010_0000_0000;
pub const STATE_CULL_CCW: u64 = 0x0000_0020_0000_0000;
pub const STATE_CULL_MASK: u64 = 0x0000_0030_0000_0000;
pub const STATE_FRONT_CCW: u64 = 0x0000_0080_0000_0000;
pub const STATE_MSAA: u64 = 0x0100_0000_0000_0000;

/// Same blend function for color and alpha.
pub const fn state_blend_func(src: u64, dst: u64) -> u64 {
    let factors = src | (dst << 4);
    factors | (factors << 8)
}

/// Standard alpha blending: `src * a + dst * (1 - a)`.
pub const STATE_BLEND_NORMAL: u64 =
    state_blend_func(STATE_BLEND_SRC_ALPHA, STATE_BLEND_INV_SRC_ALPHA);

pub const STATE_DEFAULT: u64 = STATE_WRITE_RGB
    | STATE_WRITE_A
    | STATE_WRITE_Z
    | STATE_DEPTH_TEST_LESS
    | STATE_CULL_CW
    | STATE_MSAA;

// ── clear / reset / buffer flags ──────────────────────────────────────────

pub const CLEAR_NONE: u16 = 0x0000;
pub const CLEAR_COLOR: u16 = 0x0001;
pub const CLEAR_DEPTH: u16 = 0x0002;
pub const CLEAR_STENCIL: u16 = 0x0004;

pub const RESET_NONE: u32 = 0x0000_0000;
pub const RESET_MSAA_X4: u32 = 0x0000_0020;
pub const RESET_VSYNC: u32 = 0x0000_0080;

pub const BUFFER_NONE: u16 = 0x0000;
pub const BUFFER_INDEX32: u16 = 0x1000;

// ── uniforms ──────────────────────────────────────────────────────────────

/// Uniform type tags as stored in the shader container.
pub const UNIFORM_TYPE_SAMPLER: u8 = 0;
pub const UNIFORM_TYPE_END: u8 = 1;
pub const UNIFORM_TYPE_VEC4: u8 = 2;
pub const UNIFORM_TYPE_MAT3: u8 = 3;
pub const UNIFORM_TYPE_MAT4: u8 = 4;

/// Set on uniforms that belong to the fragment stage.
pub const UNIFORM_FRAGMENT_BIT: u8 = 0x10;

/// Set on sampler uniforms.
pub const UNIFORM_SAMPLER_BIT: u8 = 0x20;

/// Strips the stage/sampler bits from a container type tag.
#[inline]
pub const fn uniform_base_type(tag: u8) -> u8 {
    tag & !(UNIFORM_FRAGMENT_BIT | UNIFORM_SAMPLER_BIT)
}

/// What the backend knows about a registered uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    /// Base type tag (`UNIFORM_TYPE_*`).
    pub kind: u8,
    /// Number of array elements.
    pub num: u16,
}

// ── textures ──────────────────────────────────────────────────────────────

/// Pixel formats the engine uploads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Rgb8,
}

impl TextureFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::Rgb8 => 3,
        }
    }
}

/// Texture creation parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width, or the side length of a cube face.
    pub width: u16,
    pub height: u16,
    pub has_mips: bool,
    pub num_layers: u16,
    pub format: TextureFormat,
    pub flags: u64,
}

// ── backend contract ──────────────────────────────────────────────────────

/// Handle-based GPU backend.
///
/// All calls must come from the single render context. Apart from shader
/// creation (which parses caller-supplied bytes) the backend is assumed to
/// succeed given valid input.
pub trait Backend {
    /// Creates a shader from an encoded shader container.
    fn create_shader(&mut self, bytes: &[u8]) -> Result<ShaderId>;

    /// Uniforms registered by `shader`, in container order.
    fn shader_uniforms(&self, shader: ShaderId) -> Vec<UniformId>;

    fn uniform_info(&self, uniform: UniformId) -> UniformInfo;

    fn destroy_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> ProgramId;

    fn destroy_program(&mut self, program: ProgramId);

    fn create_vertex_buffer(&mut self, data: &[u8], layout: &VertexLayout) -> VertexBufferId;

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferId);

    /// `flags` is `BUFFER_NONE` for 16-bit indices or `BUFFER_INDEX32`.
    fn create_index_buffer(&mut self, data: &[u8], flags: u16) -> IndexBufferId;

    fn destroy_index_buffer(&mut self, buffer: IndexBufferId);

    fn create_texture_2d(&mut self, desc: TextureDesc, data: Vec<u8>) -> TextureId;

    /// `data` holds every face, each followed by its mip chain.
    fn create_texture_cube(&mut self, desc: TextureDesc, data: Vec<u8>) -> TextureId;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Writes `num` registers (4 floats each) starting at `values`.
    fn set_uniform(&mut self, uniform: UniformId, values: &[f32], num: u16);

    fn set_texture(&mut self, stage: u8, sampler: UniformId, texture: TextureId);

    fn set_index_buffer(&mut self, buffer: IndexBufferId);

    fn set_vertex_buffer(&mut self, stream: u8, buffer: VertexBufferId);

    fn set_state(&mut self, state: u64);

    fn set_view_clear(&mut self, view: u16, flags: u16, rgba: u32, depth: f32, stencil: u8);

    fn set_view_rect(&mut self, view: u16, x: u16, y: u16, width: u16, height: u16);

    fn reset(&mut self, width: u32, height: u32, flags: u32);

    /// Submits the pending draw bindings with `program` to `view`.
    fn submit(&mut self, view: u16, program: ProgramId);

    /// Finishes the frame and presents it. Returns the frame number.
    fn frame(&mut self) -> u32;
}
