//! Hand-written bridge doubles shared by the provider crates' tests.
//!
//! Enabled for this crate's own tests and, for downstream crates, through the
//! `test-support` feature.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AudioContext, AudioContextFactory, FrameCallback, FrameHandle, FrameScheduler, GainNode,
    GlobalValue, ListenerId, MediaElement, NativeEvent, NativeEventKind, NativeListener,
    NativeMediaError, NetworkState, Preload, ReadyState, ScriptHost, SourceNode, StreamHandle,
    TimeRanges,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Frame Scheduler
// ============================================================================

/// Frame scheduler advanced explicitly with [`tick`](Self::tick).
#[derive(Default)]
pub struct ManualFrameScheduler {
    state: Mutex<ManualFrames>,
}

#[derive(Default)]
struct ManualFrames {
    next_id: u64,
    pending: Vec<(u64, FrameCallback)>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every callback queued before this call.
    pub fn tick(&self) {
        let due = std::mem::take(&mut self.state.lock().pending);
        for (_, callback) in due {
            callback();
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.pending.push((id, callback));
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state.lock().pending.retain(|(id, _)| *id != handle.0);
    }
}

// ============================================================================
// Media Element
// ============================================================================

/// Element properties a test can set directly.
#[derive(Debug, Clone)]
pub struct ElementProps {
    pub paused: bool,
    pub ended: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub ready_state: ReadyState,
    pub network_state: NetworkState,
    pub buffered: TimeRanges,
    pub seekable: TimeRanges,
    pub played: TimeRanges,
    pub error: Option<NativeMediaError>,
    pub src: Option<String>,
    pub src_object: Option<StreamHandle>,
    pub preload: Option<Preload>,
    pub plays_inline: bool,
    pub native_hls: bool,
    pub fullscreen: bool,
    pub picture_in_picture: bool,
    pub remote_playback: bool,
}

impl Default for ElementProps {
    fn default() -> Self {
        Self {
            paused: true,
            ended: false,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            ready_state: ReadyState::HaveNothing,
            network_state: NetworkState::Empty,
            buffered: TimeRanges::empty(),
            seekable: TimeRanges::empty(),
            played: TimeRanges::empty(),
            error: None,
            src: None,
            src_object: None,
            preload: None,
            plays_inline: false,
            native_hls: false,
            fullscreen: true,
            picture_in_picture: true,
            remote_playback: false,
        }
    }
}

/// Element double with dispatchable native events.
#[derive(Default)]
pub struct MockMediaElement {
    props: Mutex<ElementProps>,
    listeners: Mutex<Vec<(ListenerId, NativeEventKind, NativeListener)>>,
    next_listener: AtomicUsize,
    load_calls: AtomicUsize,
    play_calls: AtomicUsize,
    pause_calls: AtomicUsize,
    reject_play: Mutex<Option<BridgeError>>,
}

impl MockMediaElement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_props(props: ElementProps) -> Arc<Self> {
        let element = Self::default();
        *element.props.lock() = props;
        Arc::new(element)
    }

    pub fn props(&self) -> ElementProps {
        self.props.lock().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut ElementProps)) {
        f(&mut self.props.lock());
    }

    /// Deliver a native event to every listener registered for its kind.
    pub fn dispatch(&self, kind: NativeEventKind) {
        self.dispatch_event(&NativeEvent::new(kind));
    }

    pub fn dispatch_event(&self, event: &NativeEvent) {
        let targets: Vec<NativeListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        for listener in targets {
            listener(event);
        }
    }

    pub fn listener_count(&self, kind: NativeEventKind) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn play_calls(&self) -> usize {
        self.play_calls.load(Ordering::SeqCst)
    }

    pub fn pause_calls(&self) -> usize {
        self.pause_calls.load(Ordering::SeqCst)
    }

    /// Make the next `play()` calls fail with `error`.
    pub fn reject_play(&self, error: Option<BridgeError>) {
        *self.reject_play.lock() = error;
    }
}

#[async_trait]
impl MediaElement for MockMediaElement {
    fn add_event_listener(&self, kind: NativeEventKind, listener: NativeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst) as u64 + 1);
        self.listeners.lock().push((id, kind, listener));
        id
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _, _)| *lid != id);
    }

    fn paused(&self) -> bool {
        self.props.lock().paused
    }

    fn ended(&self) -> bool {
        self.props.lock().ended
    }

    fn current_time(&self) -> f64 {
        self.props.lock().current_time
    }

    fn duration(&self) -> f64 {
        self.props.lock().duration
    }

    fn volume(&self) -> f64 {
        self.props.lock().volume
    }

    fn muted(&self) -> bool {
        self.props.lock().muted
    }

    fn playback_rate(&self) -> f64 {
        self.props.lock().playback_rate
    }

    fn ready_state(&self) -> ReadyState {
        self.props.lock().ready_state
    }

    fn network_state(&self) -> NetworkState {
        self.props.lock().network_state
    }

    fn buffered(&self) -> TimeRanges {
        self.props.lock().buffered.clone()
    }

    fn seekable(&self) -> TimeRanges {
        self.props.lock().seekable.clone()
    }

    fn played(&self) -> TimeRanges {
        self.props.lock().played.clone()
    }

    fn error(&self) -> Option<NativeMediaError> {
        self.props.lock().error.clone()
    }

    fn current_src(&self) -> Option<String> {
        self.props.lock().src.clone()
    }

    fn can_play_type(&self, mime_type: &str) -> bool {
        let mime = mime_type.to_ascii_lowercase();
        if mime.contains("mpegurl") {
            return self.props.lock().native_hls;
        }
        mime.starts_with("video/") || mime.starts_with("audio/")
    }

    fn set_volume(&self, volume: f64) {
        self.props.lock().volume = volume;
    }

    fn set_muted(&self, muted: bool) {
        self.props.lock().muted = muted;
    }

    fn set_current_time(&self, time: f64) {
        self.props.lock().current_time = time;
    }

    fn set_playback_rate(&self, rate: f64) {
        self.props.lock().playback_rate = rate;
    }

    fn set_plays_inline(&self, inline: bool) {
        self.props.lock().plays_inline = inline;
    }

    fn set_preload(&self, preload: Preload) {
        self.props.lock().preload = Some(preload);
    }

    fn set_src(&self, src: Option<&str>) {
        self.props.lock().src = src.map(str::to_string);
    }

    fn set_src_object(&self, stream: Option<&StreamHandle>) {
        self.props.lock().src_object = stream.cloned();
    }

    fn load(&self) {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn play(&self) -> BridgeResult<()> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.reject_play.lock().clone() {
            return Err(err);
        }
        self.props.lock().paused = false;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.props.lock().paused = true;
        Ok(())
    }

    fn supports_fullscreen(&self) -> bool {
        self.props.lock().fullscreen
    }

    async fn request_fullscreen(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn exit_fullscreen(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn supports_picture_in_picture(&self) -> bool {
        self.props.lock().picture_in_picture
    }

    async fn request_picture_in_picture(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn exit_picture_in_picture(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn supports_remote_playback(&self) -> bool {
        self.props.lock().remote_playback
    }

    async fn prompt_remote_playback(&self) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Script Host
// ============================================================================

/// Script host that counts fetches per URL and yields before completing, so
/// concurrent loads genuinely overlap.
#[derive(Default)]
pub struct CountingScriptHost {
    fetches: Mutex<HashMap<String, usize>>,
    globals: Mutex<HashMap<String, GlobalValue>>,
    /// Globals published once the script at the given URL has run.
    on_load: Mutex<HashMap<String, (String, GlobalValue)>>,
    failing: Mutex<HashSet<String>>,
    preconnects: Mutex<Vec<String>>,
    server_rendering: AtomicBool,
}

impl CountingScriptHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish `value` under `symbol` when `url` is loaded.
    pub fn serve(&self, url: &str, symbol: &str, value: GlobalValue) {
        self.on_load
            .lock()
            .insert(url.to_string(), (symbol.to_string(), value));
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().get(url).copied().unwrap_or(0)
    }

    pub fn preconnects(&self) -> Vec<String> {
        self.preconnects.lock().clone()
    }

    pub fn set_server_rendering(&self, ssr: bool) {
        self.server_rendering.store(ssr, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScriptHost for CountingScriptHost {
    async fn load_script(&self, url: &str) -> BridgeResult<()> {
        *self.fetches.lock().entry(url.to_string()).or_insert(0) += 1;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        if self.failing.lock().contains(url) {
            return Err(BridgeError::ScriptLoad {
                url: url.to_string(),
                message: "404 Not Found".to_string(),
            });
        }
        let published = self.on_load.lock().get(url).cloned();
        if let Some((symbol, value)) = published {
            self.globals.lock().insert(symbol, value);
        }
        Ok(())
    }

    fn global(&self, symbol: &str) -> Option<GlobalValue> {
        self.globals.lock().get(symbol).cloned()
    }

    fn preconnect(&self, url: &str) {
        self.preconnects.lock().push(url.to_string());
    }

    fn is_interactive(&self) -> bool {
        !self.server_rendering.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Audio Graph
// ============================================================================

/// Audio context factory counting created and closed contexts.
pub struct MockAudioContextFactory {
    available: AtomicBool,
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl MockAudioContextFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AudioContextFactory for MockAudioContextFactory {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn create_context(&self) -> BridgeResult<Arc<dyn AudioContext>> {
        if !self.is_available() {
            return Err(BridgeError::NotAvailable("audio context".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockAudioContext {
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MockAudioContext {
    closed: Arc<AtomicUsize>,
}

impl AudioContext for MockAudioContext {
    fn create_gain(&self) -> BridgeResult<Box<dyn GainNode>> {
        Ok(Box::new(MockGainNode::default()))
    }

    fn create_element_source(
        &self,
        _element: &Arc<dyn MediaElement>,
    ) -> BridgeResult<Box<dyn SourceNode>> {
        Ok(Box::new(MockSourceNode))
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockGainNode {
    gain: Mutex<f64>,
}

impl GainNode for MockGainNode {
    fn set_gain(&self, gain: f64) {
        *self.gain.lock() = gain;
    }

    fn gain(&self) -> f64 {
        *self.gain.lock()
    }

    fn connect_to_destination(&self) {}

    fn disconnect(&self) {}
}

struct MockSourceNode;

impl SourceNode for MockSourceNode {
    fn connect(&self, _gain: &dyn GainNode) {}

    fn disconnect(&self) {}
}
