//! Engine configuration.
//!
//! Plain structures with defaults that reproduce the backend setup the engine
//! has always used. Add fields only when a concrete backend requirement exists.

use crate::backend::{CLEAR_COLOR, CLEAR_DEPTH, RESET_MSAA_X4, RESET_VSYNC};

/// Shader container constants.
///
/// The two cross-stage hashes are placeholders: the container format requires
/// them and requires that both stages agree, but the consuming backend never
/// validates their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderBinaryConfig {
    /// Container version written into the fourth magic byte.
    pub version: u8,

    /// Hash of the vertex stage outputs.
    pub outputs_hash: u32,

    /// Hash of the fragment stage inputs.
    pub inputs_hash: u32,
}

impl Default for ShaderBinaryConfig {
    fn default() -> Self {
        Self {
            version: 6,
            outputs_hash: 0x0BAD_1DEA,
            inputs_hash: 0x0BAD_1DEA,
        }
    }
}

/// Initialization parameters for a [`RenderContext`](crate::RenderContext).
#[derive(Debug, Clone)]
pub struct EngineInit {
    /// Initial backbuffer width in pixels.
    pub width: u32,

    /// Initial backbuffer height in pixels.
    pub height: u32,

    /// View every draw is submitted to.
    pub view: u16,

    /// Clear flags applied to the view at startup.
    pub clear_flags: u16,

    /// Clear color as packed RGBA8.
    pub clear_rgba: u32,

    pub clear_depth: f32,
    pub clear_stencil: u8,

    /// Reset flags used when the context is created.
    pub reset_flags: u32,

    /// Reset flags used when the render target is rebuilt after a resize.
    pub resize_reset_flags: u32,

    pub shader: ShaderBinaryConfig,
}

impl Default for EngineInit {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            view: 0,
            clear_flags: CLEAR_COLOR | CLEAR_DEPTH,
            clear_rgba: 0x4433_55FF,
            clear_depth: 1.0,
            clear_stencil: 0,
            reset_flags: RESET_VSYNC,
            resize_reset_flags: RESET_VSYNC | RESET_MSAA_X4,
            shader: ShaderBinaryConfig::default(),
        }
    }
}
