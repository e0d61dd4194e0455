//! Frame timing for the render thread.
//!
//! The frame driver owns one `FrameClock` and ticks it once per served frame
//! request; callbacks receive the resulting `FrameTime`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
