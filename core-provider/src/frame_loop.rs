//! Per-frame polling loop.
//!
//! Re-requests a frame from inside each callback until stopped. Stopping bumps
//! a generation counter, so a callback that was already queued when `stop()`
//! ran becomes a no-op even if the host fails to cancel it.

use bridge_traits::{FrameHandle, FrameScheduler};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Tick = Box<dyn Fn() + Send + Sync>;

struct LoopInner {
    scheduler: Arc<dyn FrameScheduler>,
    tick: Tick,
    state: Mutex<LoopState>,
}

#[derive(Default)]
struct LoopState {
    running: bool,
    generation: u64,
    handle: Option<FrameHandle>,
}

pub struct FrameLoop {
    inner: Arc<LoopInner>,
}

impl FrameLoop {
    pub fn new(scheduler: Arc<dyn FrameScheduler>, tick: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(LoopInner {
                scheduler,
                tick: Box::new(tick),
                state: Mutex::new(LoopState::default()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn start(&self) {
        let generation = {
            let mut state = self.inner.state.lock();
            if state.running {
                return;
            }
            state.running = true;
            state.generation += 1;
            state.generation
        };
        schedule(&self.inner, generation);
    }

    pub fn stop(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.generation += 1;
            state.handle.take()
        };
        if let Some(handle) = handle {
            self.inner.scheduler.cancel_frame(handle);
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("running", &self.is_running())
            .finish()
    }
}

fn is_current(inner: &LoopInner, generation: u64) -> bool {
    let state = inner.state.lock();
    state.running && state.generation == generation
}

fn schedule(inner: &Arc<LoopInner>, generation: u64) {
    let weak: Weak<LoopInner> = Arc::downgrade(inner);
    let handle = inner.scheduler.request_frame(Box::new(move || {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !is_current(&inner, generation) {
            return;
        }
        (inner.tick)();
        if is_current(&inner, generation) {
            schedule(&inner, generation);
        }
    }));

    let mut state = inner.state.lock();
    if state.running && state.generation == generation {
        state.handle = Some(handle);
    } else {
        drop(state);
        inner.scheduler.cancel_frame(handle);
    }
}
