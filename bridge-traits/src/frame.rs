//! Frame Scheduling
//!
//! Abstracts the host's per-frame callback facility (`requestAnimationFrame`
//! on the web, a display-link on native platforms). The core uses it to drive
//! high-frequency time updates while media is playing.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Callback run once on the next frame.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Handle identifying a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host frame scheduler.
///
/// `request_frame` schedules a single callback; callers that want a loop must
/// request a new frame from inside the callback. A cancelled handle must never
/// have its callback invoked.
pub trait FrameScheduler: Send + Sync {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Frame scheduler backed by a Tokio timer, for hosts without a display-link.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug)]
pub struct IntervalFrameScheduler {
    interval: Duration,
    state: Arc<Mutex<IntervalState>>,
}

#[derive(Debug, Default)]
struct IntervalState {
    next_id: u64,
    pending: HashSet<u64>,
}

impl IntervalFrameScheduler {
    /// Roughly one display frame at 60 Hz.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(IntervalState::default())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalFrameScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl FrameScheduler for IntervalFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.pending.insert(id);
            id
        };

        let state = Arc::clone(&self.state);
        let interval = self.interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let still_pending = state.lock().pending.remove(&id);
            if still_pending {
                callback();
            }
        });

        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state.lock().pending.remove(&handle.0);
    }
}
