//! # Remote-Playback Coordinator
//!
//! Tracks the cast session through `disconnected → connecting → connected →
//! disconnected` and moves playback between the local adapter and the cast
//! adapter.
//!
//! - **Connecting**: the local position, paused flag and volume are captured
//!   so the receiver can pick up where local playback was.
//! - **Connected**: the runtime re-runs selection; the cast loader now accepts
//!   the source and the cast adapter resumes or loads it on the receiver.
//! - **Disconnected**: the receiver position is captured as the saved state
//!   before the session ends, handed to the runtime as a resume point, and
//!   selection runs again so a local adapter takes over.
//!
//! The coordinator never owns the runtime. It holds a weak
//! [`PlaybackHandoff`] so the runtime can own the cast loader, which owns the
//! coordinator.

use crate::error::{CastError, Result};
use bridge_traits::cast::{RemotePlayerListener, SessionStateListener};
use bridge_traits::{
    CastContext, CastSessionState, ListenerId, NativeEvent, NativeEventKind, RemotePlayer,
    RemotePlayerEventKind,
};
use core_provider::{MediaDelegate, PlaybackHandoff, ProviderError, ResumePoint};
use core_runtime::config::LOADER_GOOGLE_CAST;
use core_runtime::events::{
    MediaEvent, MediaEventKind, RemotePlaybackDetail, RemotePlaybackKind, RemotePlaybackState,
    Trigger,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Local playback state captured when a session starts connecting.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSnapshot {
    pub src: Option<String>,
    pub paused: bool,
    pub time: f64,
    pub muted: bool,
    pub volume: f64,
}

/// Receiver position captured when a session ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedState {
    pub paused: bool,
    pub time: f64,
}

impl From<SavedState> for ResumePoint {
    fn from(saved: SavedState) -> Self {
        ResumePoint {
            time: saved.time,
            paused: saved.paused,
        }
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    remote: RemotePlaybackState,
    device: Option<String>,
    local: Option<LocalSnapshot>,
    saved: Option<SavedState>,
    last_observed: Option<SavedState>,
}

#[derive(Default)]
struct Subscriptions {
    session: Option<ListenerId>,
    player: Option<ListenerId>,
}

pub struct CastCoordinator {
    cast: Arc<dyn CastContext>,
    delegate: Arc<MediaDelegate>,
    handoff: Mutex<Option<Weak<dyn PlaybackHandoff>>>,
    state: Mutex<CoordinatorState>,
    subscriptions: Mutex<Subscriptions>,
    weak_self: Weak<CastCoordinator>,
}

impl CastCoordinator {
    pub fn new(cast: Arc<dyn CastContext>, delegate: Arc<MediaDelegate>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            cast,
            delegate,
            handoff: Mutex::new(None),
            state: Mutex::new(CoordinatorState::default()),
            subscriptions: Mutex::new(Subscriptions::default()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn bind_handoff(&self, handoff: Weak<dyn PlaybackHandoff>) {
        *self.handoff.lock() = Some(handoff);
    }

    pub fn cast_context(&self) -> &Arc<dyn CastContext> {
        &self.cast
    }

    pub fn remote_player(&self) -> Arc<dyn RemotePlayer> {
        self.cast.remote_player()
    }

    pub fn state(&self) -> RemotePlaybackState {
        self.state.lock().remote
    }

    pub fn is_connected(&self) -> bool {
        self.state() == RemotePlaybackState::Connected
    }

    pub fn device(&self) -> Option<String> {
        self.state.lock().device.clone()
    }

    pub fn saved_state(&self) -> Option<SavedState> {
        self.state.lock().saved
    }

    pub fn local_snapshot(&self) -> Option<LocalSnapshot> {
        self.state.lock().local.clone()
    }

    /// Hand the local snapshot to the first receiver load of `src`.
    pub fn take_local_snapshot(&self, src: &str) -> Option<LocalSnapshot> {
        let mut state = self.state.lock();
        match &state.local {
            Some(local) if local.src.as_deref() == Some(src) => state.local.take(),
            _ => None,
        }
    }

    /// Latest receiver position seen by the cast adapter's time sync.
    pub fn record_observation(&self, observed: SavedState) {
        self.state.lock().last_observed = Some(observed);
    }

    /// Follow the cast context and remote player. Idempotent.
    pub fn attach(&self) {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.session.is_some() {
            return;
        }

        let weak = self.weak_self.clone();
        let on_session: SessionStateListener = Arc::new(move |state| {
            if let Some(this) = weak.upgrade() {
                spawn_detached(async move { this.handle_session_state(state).await });
            }
        });
        subscriptions.session = Some(self.cast.add_session_state_listener(on_session));

        let weak = self.weak_self.clone();
        let player = self.cast.remote_player();
        let on_connection: RemotePlayerListener = Arc::new(move |_| {
            if let Some(this) = weak.upgrade() {
                let connected = this.remote_player().is_connected();
                spawn_detached(async move { this.handle_connection(connected).await });
            }
        });
        subscriptions.player =
            Some(player.add_listener(RemotePlayerEventKind::IsConnectedChanged, on_connection));
        debug!("cast coordinator attached");
    }

    pub fn detach(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        if let Some(id) = subscriptions.session {
            self.cast.remove_session_state_listener(id);
        }
        if let Some(id) = subscriptions.player {
            self.cast.remote_player().remove_listener(id);
        }
    }

    /// Show the device picker and start a session.
    pub async fn request_session(&self) -> Result<()> {
        if !self.cast.is_available() {
            return Err(CastError::NotAvailable);
        }
        info!("requesting cast session");
        match self.cast.request_session().await {
            None => Ok(()),
            Some(code) => {
                let error = CastError::from_code(code);
                warn!(code = %code, "cast session request failed");
                self.publish(
                    MediaEventKind::Error(ProviderError::from(error.clone()).to_detail()),
                    None,
                );
                if self.state() == RemotePlaybackState::Connecting {
                    self.disconnect(false, None).await;
                }
                Err(error)
            }
        }
    }

    /// End the session from this side and continue locally.
    pub async fn end_session(&self) {
        self.disconnect(true, None).await;
    }

    /// Apply a session-state change reported by the cast context.
    pub async fn handle_session_state(&self, session_state: CastSessionState) {
        let native = NativeEvent::new(NativeEventKind::Remote("sessionStateChanged"));
        let trigger = Some(Trigger::Native(&native));
        debug!(state = ?session_state, "cast session state");
        match session_state {
            CastSessionState::SessionStarting => self.connecting(trigger),
            CastSessionState::SessionStarted | CastSessionState::SessionResumed => {
                self.connected(trigger).await
            }
            CastSessionState::SessionEnding
            | CastSessionState::SessionEnded
            | CastSessionState::SessionStartFailed
            | CastSessionState::NoSession => self.disconnect(false, trigger).await,
        }
    }

    /// Apply a connection change reported by the remote player.
    pub async fn handle_connection(&self, connected: bool) {
        let native = NativeEvent::new(NativeEventKind::Remote(
            RemotePlayerEventKind::IsConnectedChanged.name(),
        ));
        let trigger = Some(Trigger::Native(&native));
        if connected {
            self.connected(trigger).await;
        } else {
            self.disconnect(false, trigger).await;
        }
    }

    fn connecting(&self, trigger: Option<Trigger<'_>>) {
        let local = self.capture_local();
        {
            let mut state = self.state.lock();
            if state.remote != RemotePlaybackState::Disconnected {
                return;
            }
            state.remote = RemotePlaybackState::Connecting;
            state.local = Some(local);
            state.saved = None;
        }
        self.publish_state(trigger);
    }

    async fn connected(&self, trigger: Option<Trigger<'_>>) {
        let device = self
            .cast
            .current_session()
            .and_then(|session| session.device_name());
        let local = self.capture_local();
        {
            let mut state = self.state.lock();
            if state.remote == RemotePlaybackState::Connected {
                return;
            }
            // A resumed session skips `connecting`.
            if state.local.is_none() {
                state.local = Some(local);
            }
            state.remote = RemotePlaybackState::Connected;
            state.device = device.clone();
            state.saved = None;
            state.last_observed = None;
        }
        info!(device = device.as_deref().unwrap_or("-"), "cast session connected");
        self.publish_state(trigger);
        self.reselect().await;
    }

    async fn disconnect(&self, end_session: bool, trigger: Option<Trigger<'_>>) {
        let previous = self.state();
        if previous == RemotePlaybackState::Disconnected {
            return;
        }

        let saved = (previous == RemotePlaybackState::Connected).then(|| self.capture_saved());
        {
            let mut state = self.state.lock();
            state.remote = RemotePlaybackState::Disconnected;
            state.device = None;
            state.local = None;
            state.saved = saved;
        }
        if end_session {
            self.cast.end_current_session(false);
        }
        info!(saved = ?saved, "cast session disconnected");
        self.publish_state(trigger);

        if let Some(saved) = saved {
            if let Some(handoff) = self.handoff() {
                handoff.set_resume_point(saved.into());
            }
            self.reselect().await;
        }
    }

    fn capture_local(&self) -> LocalSnapshot {
        self.delegate.store().read(|media| LocalSnapshot {
            src: media.source.clone(),
            paused: media.paused,
            time: media.current_time,
            muted: media.muted,
            volume: media.volume,
        })
    }

    /// Receiver position, falling back to the last observation once the
    /// receiver has already dropped its media.
    fn capture_saved(&self) -> SavedState {
        let player = self.cast.remote_player();
        let live = (player.is_connected() && player.is_media_loaded()).then(|| SavedState {
            paused: player.is_paused(),
            time: player.current_time(),
        });
        let state = self.state.lock();
        live.or(state.last_observed)
            .or_else(|| {
                state.local.as_ref().map(|local| SavedState {
                    paused: local.paused,
                    time: local.time,
                })
            })
            .unwrap_or(SavedState {
                paused: true,
                time: 0.0,
            })
    }

    fn handoff(&self) -> Option<Arc<dyn PlaybackHandoff>> {
        self.handoff.lock().as_ref().and_then(Weak::upgrade)
    }

    async fn reselect(&self) {
        let Some(handoff) = self.handoff() else {
            debug!("no playback hand-off bound; skipping reselect");
            return;
        };
        if let Err(err) = handoff.reselect().await {
            if err.is_race_lost() {
                debug!("hand-off superseded");
            } else {
                warn!(error = %err, "hand-off reselect failed");
            }
        }
    }

    fn publish_state(&self, trigger: Option<Trigger<'_>>) {
        let (state, device) = {
            let state = self.state.lock();
            (state.remote, state.device.clone())
        };
        self.publish(
            MediaEventKind::RemotePlaybackChange(RemotePlaybackDetail {
                kind: RemotePlaybackKind::GoogleCast,
                state,
                device,
            }),
            trigger,
        );
    }

    fn publish(&self, kind: MediaEventKind, trigger: Option<Trigger<'_>>) {
        let event = MediaEvent::new(kind).with_trigger(trigger);
        self.delegate.notify(Some(LOADER_GOOGLE_CAST), &event);
    }
}

impl Drop for CastCoordinator {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for CastCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CastCoordinator")
            .field("state", &state.remote)
            .field("device", &state.device)
            .field("saved", &state.saved)
            .finish()
    }
}

/// Run `task` on the ambient tokio runtime. Without one the change is
/// dropped; hosts drive the coordinator from inside a runtime.
pub(crate) fn spawn_detached(task: impl Future<Output = ()> + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(task);
        }
        Err(_) => debug!("no async runtime; dropping cast callback"),
    }
}
