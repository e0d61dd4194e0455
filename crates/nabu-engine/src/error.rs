use thiserror::Error;

/// Recoverable failures surfaced to the immediate caller.
///
/// Caller bugs (wrong uniform-buffer count, stale handles, drawing without a
/// bound program) are not represented here; they panic at the point of detection.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("uniform `{name}` cannot be encoded: {reason}")]
    UnsupportedUniform { name: String, reason: String },

    #[error("unsupported blend mode {0}")]
    UnsupportedBlendMode(i32),

    #[error("unsupported pixel format {0}")]
    UnsupportedPixelFormat(String),

    #[error("unsupported vertex attribute type {0}")]
    UnsupportedAttribType(u32),

    #[error("unsupported vertex attribute location {0}")]
    UnsupportedAttribLocation(u32),

    #[error("shader compile error: {0}")]
    Compile(String),

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("malformed shader binary: {0}")]
    MalformedShader(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("frame driver is no longer running")]
    FrameDriverClosed,

    #[error("failed to start the render thread: {0}")]
    RenderThread(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
