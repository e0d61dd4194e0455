//! Nabu engine crate.
//!
//! This crate owns the shader translation and draw-state binding layers used by
//! a scripting front-end: reflected shader stages are encoded into the backend's
//! binary shader container, and abstract draw calls are mapped onto backend handles.

pub mod backend;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod handle;
pub mod logging;
pub mod shader;
pub mod texture;
pub mod time;

pub use config::{EngineInit, ShaderBinaryConfig};
pub use context::RenderContext;
pub use dispatch::{Command, Reply};
pub use error::{EngineError, Result};
pub use frame::{FrameDriver, FrameScheduler};
