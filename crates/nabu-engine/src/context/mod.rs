//! Render context: the single owner of the backend and of every resource
//! handed to callers.
//!
//! All operations run on the thread that owns the context. Caller-facing
//! handles are generation-checked; using one after its resource was deleted is
//! a caller bug and panics.

mod buffers;
mod program;
mod state;
mod textures;

pub use state::{BLEND_MODE_DISABLE, BLEND_MODE_NORMAL};

use crate::backend::{Backend, CLEAR_COLOR, CLEAR_DEPTH, CLEAR_STENCIL, STATE_DEFAULT};
use crate::config::EngineInit;
use crate::geometry::{IndexBufferData, VertexArray, VertexBufferData};
use crate::handle::{Arena, Handle};
use crate::shader::{ProgramData, ProgramHandle, ShaderCompiler};
use crate::texture::TextureData;

pub struct RenderContext<B: Backend> {
    backend: B,
    compiler: Box<dyn ShaderCompiler + Send>,
    init: EngineInit,

    programs: Arena<ProgramData>,
    textures: Arena<TextureData>,
    vertex_buffers: Arena<VertexBufferData>,
    index_buffers: Arena<IndexBufferData>,
    vertex_arrays: Arena<VertexArray>,

    current_program: Option<ProgramHandle>,
    engine_state: u64,

    width: u32,
    height: u32,

    // accepted but not applied
    z_offset: f32,
    depth_write: bool,
}

impl<B: Backend> RenderContext<B> {
    /// Takes ownership of `backend` and applies the initial view setup.
    pub fn new(mut backend: B, compiler: Box<dyn ShaderCompiler + Send>, init: EngineInit) -> Self {
        backend.reset(init.width, init.height, init.reset_flags);
        backend.set_view_clear(
            init.view,
            init.clear_flags,
            init.clear_rgba,
            init.clear_depth,
            init.clear_stencil,
        );
        backend.set_view_rect(init.view, 0, 0, clamp_u16(init.width), clamp_u16(init.height));

        log::debug!(
            "render context created: {}x{}, view {}",
            init.width,
            init.height,
            init.view
        );

        Self {
            backend,
            compiler,
            width: init.width,
            height: init.height,
            init,
            programs: Arena::new(),
            textures: Arena::new(),
            vertex_buffers: Arena::new(),
            index_buffers: Arena::new(),
            vertex_arrays: Arena::new(),
            current_program: None,
            engine_state: STATE_DEFAULT,
            z_offset: 0.0,
            depth_write: true,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn init(&self) -> &EngineInit {
        &self.init
    }

    /// Render state pushed with every indexed draw.
    pub fn engine_state(&self) -> u64 {
        self.engine_state
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    // ── render target ─────────────────────────────────────────────────────

    /// Resizes the render target; fractional sizes are truncated.
    pub fn update_size(&mut self, width: f32, height: f32) {
        let (w, h) = (width as u32, height as u32);
        if (w, h) != (self.width, self.height) {
            self.width = w;
            self.height = h;
            self.update_render_target();
        }
    }

    /// Rebuilds the backbuffer at the current size.
    pub fn update_render_target(&mut self) {
        log::debug!("render target reset to {}x{}", self.width, self.height);
        self.backend
            .reset(self.width, self.height, self.init.resize_reset_flags);
        self.backend.set_view_rect(
            self.init.view,
            0,
            0,
            clamp_u16(self.width),
            clamp_u16(self.height),
        );
    }

    pub fn render_width(&self) -> u32 {
        self.width
    }

    pub fn render_height(&self) -> u32 {
        self.height
    }

    pub fn suspend(&mut self) {
        log::debug!("suspend requested; nothing to release");
    }

    /// Sets what the view clears to at the start of each frame.
    pub fn clear(&mut self, color: [f32; 4], backbuffer: bool, depth: bool, stencil: bool) {
        let mut flags = 0;
        if backbuffer {
            flags |= CLEAR_COLOR;
        }
        if depth {
            flags |= CLEAR_DEPTH;
        }
        if stencil {
            flags |= CLEAR_STENCIL;
        }
        self.backend.set_view_clear(
            self.init.view,
            flags,
            pack_rgba8(color),
            self.init.clear_depth,
            self.init.clear_stencil,
        );
    }

    /// Finishes the frame on the backend and returns its number.
    pub fn present_frame(&mut self) -> u32 {
        let frame = self.backend.frame();
        log::trace!("frame {frame} presented");
        frame
    }
}

impl<B: Backend> Drop for RenderContext<B> {
    fn drop(&mut self) {
        for program in self.programs.drain() {
            program.destroy(&mut self.backend);
        }
        for texture in self.textures.drain() {
            if let Some(id) = texture.texture {
                self.backend.destroy_texture(id);
            }
        }
        for buffer in self.vertex_buffers.drain() {
            self.backend.destroy_vertex_buffer(buffer.buffer);
        }
        for buffer in self.index_buffers.drain() {
            self.backend.destroy_index_buffer(buffer.buffer);
        }
    }
}

fn clamp_u16(v: u32) -> u16 {
    v.min(u16::MAX as u32) as u16
}

/// Packs a float color as `0xRRGGBBAA`.
fn pack_rgba8(color: [f32; 4]) -> u32 {
    color
        .iter()
        .fold(0u32, |acc, c| (acc << 8) | (c.clamp(0.0, 1.0) * 255.0).round() as u32)
}

/// Resolves a caller handle or panics.
fn live<'a, T>(arena: &'a Arena<T>, handle: Handle<T>, what: &str) -> &'a T {
    match arena.get(handle) {
        Some(value) => value,
        None => panic!("stale or foreign {what} handle {handle:?}"),
    }
}

fn live_mut<'a, T>(arena: &'a mut Arena<T>, handle: Handle<T>, what: &str) -> &'a mut T {
    match arena.get_mut(handle) {
        Some(value) => value,
        None => panic!("stale or foreign {what} handle {handle:?}"),
    }
}
