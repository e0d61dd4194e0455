use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::backend::Backend;
use crate::context::RenderContext;
use crate::error::{EngineError, Result};
use crate::time::{FrameClock, FrameTime};

/// Work scheduled for one frame.
pub type FrameCallback<B> = Box<dyn FnOnce(&mut RenderContext<B>, FrameTime) + Send>;

/// Where the driver is in serving a request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    /// A callback is running.
    Executing,
    /// The callback returned; the frame is being presented.
    Presenting,
}

impl FramePhase {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => FramePhase::Executing,
            2 => FramePhase::Presenting,
            _ => FramePhase::Idle,
        }
    }
}

/// State visible from both ends of the queue.
#[derive(Debug, Default)]
struct Shared {
    phase: AtomicU8,
    presented: AtomicU64,
}

impl Shared {
    fn phase(&self) -> FramePhase {
        FramePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: FramePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// Sending side: request frames from any thread.
pub struct FrameScheduler<B: Backend> {
    tx: Sender<FrameCallback<B>>,
    shared: Arc<Shared>,
}

impl<B: Backend> Clone for FrameScheduler<B> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Backend> FrameScheduler<B> {
    /// Queues `callback` for the next frame and returns immediately.
    ///
    /// Fails only when the driver has been dropped.
    pub fn request_frame<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&mut RenderContext<B>, FrameTime) + Send + 'static,
    {
        self.tx
            .send(Box::new(callback))
            .map_err(|_| EngineError::FrameDriverClosed)
    }

    pub fn phase(&self) -> FramePhase {
        self.shared.phase()
    }

    pub fn frames_presented(&self) -> u64 {
        self.shared.presented.load(Ordering::Acquire)
    }
}

/// Receiving side: serves requests against a render context.
pub struct FrameDriver<B: Backend> {
    rx: Receiver<FrameCallback<B>>,
    clock: FrameClock,
    shared: Arc<Shared>,
}

impl<B: Backend> FrameDriver<B> {
    pub fn new() -> (Self, FrameScheduler<B>) {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared::default());
        let driver = Self {
            rx,
            clock: FrameClock::new(),
            shared: Arc::clone(&shared),
        };
        (driver, FrameScheduler { tx, shared })
    }

    /// Serves every request queued at call time and returns how many ran.
    ///
    /// Requests made by the callbacks themselves wait for the next pump.
    pub fn pump(&mut self, ctx: &mut RenderContext<B>) -> usize {
        let pending = self.rx.len();
        let mut served = 0;
        while served < pending {
            let Ok(callback) = self.rx.try_recv() else {
                break;
            };
            self.serve(ctx, callback);
            served += 1;
        }
        served
    }

    /// Serves requests until every scheduler is dropped and the queue drains.
    pub fn run(&mut self, ctx: &mut RenderContext<B>) {
        while let Ok(callback) = self.rx.recv() {
            self.serve(ctx, callback);
        }
        log::debug!(
            "frame driver stopped after {} frame(s)",
            self.frames_presented()
        );
    }

    fn serve(&mut self, ctx: &mut RenderContext<B>, callback: FrameCallback<B>) {
        let time = self.clock.tick();

        self.shared.set_phase(FramePhase::Executing);
        callback(ctx, time);

        self.shared.set_phase(FramePhase::Presenting);
        ctx.present_frame();
        self.shared.presented.fetch_add(1, Ordering::AcqRel);

        self.shared.set_phase(FramePhase::Idle);
    }

    pub fn phase(&self) -> FramePhase {
        self.shared.phase()
    }

    pub fn frames_presented(&self) -> u64 {
        self.shared.presented.load(Ordering::Acquire)
    }
}

/// Starts a render thread that builds its context with `factory` and serves
/// frames until every scheduler is dropped. Joining yields the context.
pub fn spawn_render_thread<B, F>(
    factory: F,
) -> Result<(FrameScheduler<B>, JoinHandle<RenderContext<B>>)>
where
    B: Backend + Send + 'static,
    F: FnOnce() -> RenderContext<B> + Send + 'static,
{
    let (mut driver, scheduler) = FrameDriver::new();
    let handle = thread::Builder::new()
        .name("nabu-render".to_string())
        .spawn(move || {
            let mut ctx = factory();
            driver.run(&mut ctx);
            ctx
        })?;
    Ok((scheduler, handle))
}
