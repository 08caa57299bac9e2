//! Hand-written cast doubles for tests.
//!
//! Actions mutate the doubles' properties but never notify on their own;
//! tests call [`MockRemotePlayer::emit`] or drive the coordinator directly so
//! every transition happens at a known point.

use async_trait::async_trait;
use bridge_traits::cast::{RemotePlayerListener, SessionStateListener};
use bridge_traits::{
    CastContext, CastErrorCode, CastLoadRequest, CastSession, CastSessionState, ListenerId,
    RemotePlayer, RemotePlayerEventKind, RemotePlayerState, RemoteStreamType,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

// ============================================================================
// Remote Player
// ============================================================================

#[derive(Debug, Clone)]
pub struct RemoteProps {
    pub connected: bool,
    pub media_loaded: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub paused: bool,
    pub can_seek: bool,
    pub can_control_volume: bool,
    pub player_state: RemotePlayerState,
    pub stream_type: Option<RemoteStreamType>,
    pub live_seekable_range: Option<(f64, f64)>,
}

impl Default for RemoteProps {
    fn default() -> Self {
        Self {
            connected: false,
            media_loaded: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            paused: true,
            can_seek: true,
            can_control_volume: true,
            player_state: RemotePlayerState::Idle,
            stream_type: None,
            live_seekable_range: None,
        }
    }
}

#[derive(Default)]
pub struct MockRemotePlayer {
    props: Mutex<RemoteProps>,
    listeners: Mutex<Vec<(ListenerId, RemotePlayerEventKind, RemotePlayerListener)>>,
    next_listener: AtomicU64,
    toggles: AtomicUsize,
    mute_toggles: AtomicUsize,
    stops: AtomicUsize,
    seeks: Mutex<Vec<f64>>,
}

impl MockRemotePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn props(&self) -> RemoteProps {
        self.props.lock().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut RemoteProps)) {
        f(&mut self.props.lock());
    }

    /// Notify listeners of `kind` as the receiver would.
    pub fn emit(&self, kind: RemotePlayerEventKind) {
        let listeners: Vec<RemotePlayerListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(kind);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn toggles(&self) -> usize {
        self.toggles.load(Ordering::SeqCst)
    }

    pub fn mute_toggles(&self) -> usize {
        self.mute_toggles.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().clone()
    }
}

impl RemotePlayer for MockRemotePlayer {
    fn is_connected(&self) -> bool {
        self.props.lock().connected
    }

    fn is_media_loaded(&self) -> bool {
        self.props.lock().media_loaded
    }

    fn current_time(&self) -> f64 {
        self.props.lock().current_time
    }

    fn duration(&self) -> f64 {
        self.props.lock().duration
    }

    fn volume_level(&self) -> f64 {
        self.props.lock().volume
    }

    fn is_muted(&self) -> bool {
        self.props.lock().muted
    }

    fn is_paused(&self) -> bool {
        self.props.lock().paused
    }

    fn can_seek(&self) -> bool {
        self.props.lock().can_seek
    }

    fn can_control_volume(&self) -> bool {
        self.props.lock().can_control_volume
    }

    fn player_state(&self) -> RemotePlayerState {
        self.props.lock().player_state
    }

    fn stream_type(&self) -> Option<RemoteStreamType> {
        self.props.lock().stream_type
    }

    fn live_seekable_range(&self) -> Option<(f64, f64)> {
        self.props.lock().live_seekable_range
    }

    fn add_listener(&self, kind: RemotePlayerEventKind, listener: RemotePlayerListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.lock().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _, _)| *lid != id);
    }

    fn play_or_pause(&self) {
        self.toggles.fetch_add(1, Ordering::SeqCst);
        let mut props = self.props.lock();
        props.paused = !props.paused;
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let mut props = self.props.lock();
        props.media_loaded = false;
        props.paused = true;
    }

    fn seek(&self, time: f64) {
        self.seeks.lock().push(time);
        self.props.lock().current_time = time;
    }

    fn set_volume_level(&self, volume: f64) {
        self.props.lock().volume = volume;
    }

    fn mute_or_unmute(&self) {
        self.mute_toggles.fetch_add(1, Ordering::SeqCst);
        let mut props = self.props.lock();
        props.muted = !props.muted;
    }
}

// ============================================================================
// Session
// ============================================================================

/// Session double. A successful load marks the media as loaded on the
/// attached player at the requested position.
pub struct MockCastSession {
    device: Option<String>,
    player: Arc<MockRemotePlayer>,
    content_id: Mutex<Option<String>>,
    requests: Mutex<Vec<CastLoadRequest>>,
    load_result: Mutex<Option<CastErrorCode>>,
    edits: Mutex<Vec<Vec<u32>>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockCastSession {
    pub fn new(device: &str, player: Arc<MockRemotePlayer>) -> Arc<Self> {
        Arc::new(Self {
            device: Some(device.to_string()),
            player,
            content_id: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            load_result: Mutex::new(None),
            edits: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    pub fn set_content_id(&self, src: Option<&str>) {
        *self.content_id.lock() = src.map(str::to_string);
    }

    pub fn fail_loads(&self, code: Option<CastErrorCode>) {
        *self.load_result.lock() = code;
    }

    /// Park the next `load_media` until the returned gate is notified.
    pub fn gate_loads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn requests(&self) -> Vec<CastLoadRequest> {
        self.requests.lock().clone()
    }

    pub fn edits(&self) -> Vec<Vec<u32>> {
        self.edits.lock().clone()
    }
}

#[async_trait]
impl CastSession for MockCastSession {
    fn device_name(&self) -> Option<String> {
        self.device.clone()
    }

    fn media_content_id(&self) -> Option<String> {
        self.content_id.lock().clone()
    }

    async fn load_media(&self, request: CastLoadRequest) -> Option<CastErrorCode> {
        self.requests.lock().push(request.clone());
        let gate = self.gate.lock().take();
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }

        let result = *self.load_result.lock();
        if result.is_none() {
            *self.content_id.lock() = Some(request.media_info.src.clone());
            self.player.update(|props| {
                props.media_loaded = true;
                props.current_time = request.current_time;
                props.paused = !request.autoplay;
            });
        }
        result
    }

    async fn edit_tracks(&self, active_track_ids: Vec<u32>) -> Option<CastErrorCode> {
        self.edits.lock().push(active_track_ids);
        None
    }
}

// ============================================================================
// Context
// ============================================================================

pub struct MockCastContext {
    available: AtomicBool,
    state: Mutex<CastSessionState>,
    session: Mutex<Option<Arc<MockCastSession>>>,
    request_result: Mutex<Option<CastErrorCode>>,
    listeners: Mutex<Vec<(ListenerId, SessionStateListener)>>,
    next_listener: AtomicU64,
    player: Arc<MockRemotePlayer>,
    ended: Mutex<Vec<bool>>,
}

impl MockCastContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
            state: Mutex::new(CastSessionState::NoSession),
            session: Mutex::new(None),
            request_result: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            player: MockRemotePlayer::new(),
            ended: Mutex::new(Vec::new()),
        })
    }

    pub fn player(&self) -> Arc<MockRemotePlayer> {
        Arc::clone(&self.player)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Install a connected session on `device`.
    pub fn connect(&self, device: &str) -> Arc<MockCastSession> {
        let session = MockCastSession::new(device, Arc::clone(&self.player));
        *self.session.lock() = Some(Arc::clone(&session));
        *self.state.lock() = CastSessionState::SessionStarted;
        self.player.update(|props| props.connected = true);
        session
    }

    /// Drop the session the way a receiver shutting down would.
    pub fn drop_session(&self) {
        *self.session.lock() = None;
        *self.state.lock() = CastSessionState::SessionEnded;
        self.player.update(|props| {
            props.connected = false;
            props.media_loaded = false;
            props.current_time = 0.0;
        });
    }

    pub fn fail_requests(&self, code: Option<CastErrorCode>) {
        *self.request_result.lock() = code;
    }

    /// Set the state and notify listeners.
    pub fn set_state(&self, state: CastSessionState) {
        *self.state.lock() = state;
        let listeners: Vec<SessionStateListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// `stop_casting` flags of every `end_current_session` call.
    pub fn ended(&self) -> Vec<bool> {
        self.ended.lock().clone()
    }
}

#[async_trait]
impl CastContext for MockCastContext {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn session_state(&self) -> CastSessionState {
        *self.state.lock()
    }

    fn current_session(&self) -> Option<Arc<dyn CastSession>> {
        self.session
            .lock()
            .clone()
            .map(|session| session as Arc<dyn CastSession>)
    }

    async fn request_session(&self) -> Option<CastErrorCode> {
        tokio::task::yield_now().await;
        *self.request_result.lock()
    }

    fn end_current_session(&self, stop_casting: bool) {
        self.ended.lock().push(stop_casting);
        self.drop_session();
    }

    fn add_session_state_listener(&self, listener: SessionStateListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove_session_state_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    fn remote_player(&self) -> Arc<dyn RemotePlayer> {
        Arc::clone(&self.player) as Arc<dyn RemotePlayer>
    }
}
