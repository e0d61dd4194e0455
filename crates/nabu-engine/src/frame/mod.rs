//! Frame driver.
//!
//! Frame requests travel over a channel from any number of
//! [`FrameScheduler`]s to the one [`FrameDriver`] that owns the render
//! context. Each request runs exactly once on the render thread, after which
//! the frame is presented. Requests are fire-and-forget: there is no
//! cancellation and no completion signal beyond the presented-frame counter.

mod driver;

pub use driver::{spawn_render_thread, FrameCallback, FrameDriver, FramePhase, FrameScheduler};
