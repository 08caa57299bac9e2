//! # Canonical Media Events
//!
//! Every backend speaks its own event dialect. The provider runtime translates
//! all of them into the vocabulary defined here and publishes the result
//! through two channels:
//!
//! - **Synchronous listeners** receive the borrowed [`MediaEvent`] during
//!   dispatch, including its [`Trigger`] chain back to the native event that
//!   caused it.
//! - **The [`EventBus`]** broadcasts an owned [`EventRecord`] snapshot to async
//!   subscribers. Records carry the trigger chain by name only.
//!
//! ## Trigger chains
//!
//! ```text
//! native "seeked" ──▶ canonical seeked ──▶ canonical time-update (snap to end)
//!        ▲                    ▲                        │
//!        └────── Trigger::Native ◀── Trigger::Media ◀──┘
//! ```
//!
//! A trigger is a plain borrow that lives only as long as the dispatch call.
//! Nothing in the runtime stores a [`MediaEvent`] past the notify boundary.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventRecord, MediaEvent, MediaEventKind};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! let event = MediaEvent::new(MediaEventKind::Play);
//! bus.emit(EventRecord::from_event(&event, Some("video"))).ok();
//!
//! let record = rx.recv().await.unwrap();
//! assert_eq!(record.event_type.as_str(), "play");
//! # }
//! ```

use bridge_traits::surface::{NativeEvent, NativeMediaError, TimeRanges};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Event Vocabulary
// ============================================================================

/// Discriminant of a canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaEventType {
    LoadStart,
    Abort,
    Emptied,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    Play,
    Playing,
    Pause,
    Waiting,
    Stalled,
    Suspend,
    Seeking,
    Seeked,
    TimeUpdate,
    DurationChange,
    VolumeChange,
    Progress,
    RateChange,
    Ended,
    Error,
    ProviderSetup,
    ProviderChange,
    SourceChange,
    RemotePlaybackChange,
    StreamTypeChange,
    PictureInPictureChange,
    FullscreenChange,
    LibLoadStart,
    LibLoaded,
    LibLoadError,
    Unsupported,
}

impl MediaEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaEventType::LoadStart => "load-start",
            MediaEventType::Abort => "abort",
            MediaEventType::Emptied => "emptied",
            MediaEventType::LoadedMetadata => "loaded-metadata",
            MediaEventType::LoadedData => "loaded-data",
            MediaEventType::CanPlay => "can-play",
            MediaEventType::CanPlayThrough => "can-play-through",
            MediaEventType::Play => "play",
            MediaEventType::Playing => "playing",
            MediaEventType::Pause => "pause",
            MediaEventType::Waiting => "waiting",
            MediaEventType::Stalled => "stalled",
            MediaEventType::Suspend => "suspend",
            MediaEventType::Seeking => "seeking",
            MediaEventType::Seeked => "seeked",
            MediaEventType::TimeUpdate => "time-update",
            MediaEventType::DurationChange => "duration-change",
            MediaEventType::VolumeChange => "volume-change",
            MediaEventType::Progress => "progress",
            MediaEventType::RateChange => "rate-change",
            MediaEventType::Ended => "ended",
            MediaEventType::Error => "error",
            MediaEventType::ProviderSetup => "provider-setup",
            MediaEventType::ProviderChange => "provider-change",
            MediaEventType::SourceChange => "source-change",
            MediaEventType::RemotePlaybackChange => "remote-playback-change",
            MediaEventType::StreamTypeChange => "stream-type-change",
            MediaEventType::PictureInPictureChange => "picture-in-picture-change",
            MediaEventType::FullscreenChange => "fullscreen-change",
            MediaEventType::LibLoadStart => "lib-load-start",
            MediaEventType::LibLoaded => "lib-loaded",
            MediaEventType::LibLoadError => "lib-load-error",
            MediaEventType::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for MediaEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event Details
// ============================================================================

/// Canonical media error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaErrorCode {
    Aborted = 1,
    Network = 2,
    Decode = 3,
    /// Source not supported, or the resource/backend library is unusable.
    InvalidResource = 4,
}

impl MediaErrorCode {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(MediaErrorCode::Aborted),
            2 => Some(MediaErrorCode::Network),
            3 => Some(MediaErrorCode::Decode),
            4 => Some(MediaErrorCode::InvalidResource),
            _ => None,
        }
    }

    /// Fallback message used when the backend supplied none.
    pub fn default_message(&self) -> &'static str {
        match self {
            MediaErrorCode::Aborted => "The fetching process for the media resource was aborted.",
            MediaErrorCode::Network => "A network error occurred while fetching the media resource.",
            MediaErrorCode::Decode => "An error occurred while decoding the media resource.",
            MediaErrorCode::InvalidResource => "The media resource is not supported.",
        }
    }
}

/// Payload of the canonical `error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaErrorDetail {
    pub message: String,
    pub code: Option<MediaErrorCode>,
    /// Native error retained for diagnostics.
    pub native: Option<NativeMediaError>,
}

impl MediaErrorDetail {
    pub fn new(message: impl Into<String>, code: Option<MediaErrorCode>) -> Self {
        Self {
            message: message.into(),
            code,
            native: None,
        }
    }

    pub fn from_code(code: MediaErrorCode) -> Self {
        Self::new(code.default_message(), Some(code))
    }

    /// Map a native element error onto the canonical taxonomy.
    pub fn from_native(native: NativeMediaError) -> Self {
        let code = MediaErrorCode::from_code(native.code);
        let message = if native.message.is_empty() {
            code.map(|c| c.default_message().to_string())
                .unwrap_or_else(|| "Unknown media error.".to_string())
        } else {
            native.message.clone()
        };
        Self {
            message,
            code,
            native: Some(native),
        }
    }
}

/// Delivery model of the current stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreamType {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "on-demand")]
    OnDemand,
    #[serde(rename = "live")]
    Live,
    #[serde(rename = "live:dvr")]
    LiveDvr,
}

impl StreamType {
    pub fn is_live(&self) -> bool {
        matches!(self, StreamType::Live | StreamType::LiveDvr)
    }
}

/// Remote session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemotePlaybackState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Which remote route a change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemotePlaybackKind {
    GoogleCast,
    AirPlay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlaybackDetail {
    pub kind: RemotePlaybackKind,
    pub state: RemotePlaybackState,
    pub device: Option<String>,
}

/// Snapshot attached to `loaded-metadata`, `can-play` and `can-play-through`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanPlayDetail {
    pub duration: f64,
    pub buffered: TimeRanges,
    pub seekable: TimeRanges,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeUpdateDetail {
    pub current_time: f64,
    pub played: TimeRanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeDetail {
    pub volume: f64,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressDetail {
    pub buffered: TimeRanges,
    pub seekable: TimeRanges,
}

/// A canonical event together with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum MediaEventKind {
    LoadStart,
    Abort,
    Emptied,
    LoadedMetadata(CanPlayDetail),
    LoadedData,
    CanPlay(CanPlayDetail),
    CanPlayThrough(CanPlayDetail),
    Play,
    Playing,
    Pause,
    Waiting,
    Stalled,
    Suspend,
    Seeking { time: f64 },
    Seeked { time: f64 },
    TimeUpdate(TimeUpdateDetail),
    DurationChange { duration: f64 },
    VolumeChange(VolumeDetail),
    Progress(ProgressDetail),
    RateChange { rate: f64 },
    Ended,
    Error(MediaErrorDetail),
    ProviderSetup { provider: String },
    ProviderChange { provider: Option<String> },
    SourceChange { src: Option<String> },
    RemotePlaybackChange(RemotePlaybackDetail),
    StreamTypeChange { stream_type: StreamType },
    PictureInPictureChange { active: bool },
    FullscreenChange { active: bool },
    LibLoadStart { library: String },
    LibLoaded { library: String },
    LibLoadError { library: String, error: MediaErrorDetail },
    Unsupported { library: String },
}

impl MediaEventKind {
    pub fn event_type(&self) -> MediaEventType {
        match self {
            MediaEventKind::LoadStart => MediaEventType::LoadStart,
            MediaEventKind::Abort => MediaEventType::Abort,
            MediaEventKind::Emptied => MediaEventType::Emptied,
            MediaEventKind::LoadedMetadata(_) => MediaEventType::LoadedMetadata,
            MediaEventKind::LoadedData => MediaEventType::LoadedData,
            MediaEventKind::CanPlay(_) => MediaEventType::CanPlay,
            MediaEventKind::CanPlayThrough(_) => MediaEventType::CanPlayThrough,
            MediaEventKind::Play => MediaEventType::Play,
            MediaEventKind::Playing => MediaEventType::Playing,
            MediaEventKind::Pause => MediaEventType::Pause,
            MediaEventKind::Waiting => MediaEventType::Waiting,
            MediaEventKind::Stalled => MediaEventType::Stalled,
            MediaEventKind::Suspend => MediaEventType::Suspend,
            MediaEventKind::Seeking { .. } => MediaEventType::Seeking,
            MediaEventKind::Seeked { .. } => MediaEventType::Seeked,
            MediaEventKind::TimeUpdate(_) => MediaEventType::TimeUpdate,
            MediaEventKind::DurationChange { .. } => MediaEventType::DurationChange,
            MediaEventKind::VolumeChange(_) => MediaEventType::VolumeChange,
            MediaEventKind::Progress(_) => MediaEventType::Progress,
            MediaEventKind::RateChange { .. } => MediaEventType::RateChange,
            MediaEventKind::Ended => MediaEventType::Ended,
            MediaEventKind::Error(_) => MediaEventType::Error,
            MediaEventKind::ProviderSetup { .. } => MediaEventType::ProviderSetup,
            MediaEventKind::ProviderChange { .. } => MediaEventType::ProviderChange,
            MediaEventKind::SourceChange { .. } => MediaEventType::SourceChange,
            MediaEventKind::RemotePlaybackChange(_) => MediaEventType::RemotePlaybackChange,
            MediaEventKind::StreamTypeChange { .. } => MediaEventType::StreamTypeChange,
            MediaEventKind::PictureInPictureChange { .. } => MediaEventType::PictureInPictureChange,
            MediaEventKind::FullscreenChange { .. } => MediaEventType::FullscreenChange,
            MediaEventKind::LibLoadStart { .. } => MediaEventType::LibLoadStart,
            MediaEventKind::LibLoaded { .. } => MediaEventType::LibLoaded,
            MediaEventKind::LibLoadError { .. } => MediaEventType::LibLoadError,
            MediaEventKind::Unsupported { .. } => MediaEventType::Unsupported,
        }
    }
}

// ============================================================================
// Trigger Chain
// ============================================================================

/// What caused a canonical event.
#[derive(Debug, Clone, Copy)]
pub enum Trigger<'a> {
    Native(&'a NativeEvent),
    Media(&'a MediaEvent<'a>),
}

impl Trigger<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::Native(event) => event.kind.name(),
            Trigger::Media(event) => event.event_type().as_str(),
        }
    }
}

/// A canonical event as seen during dispatch.
#[derive(Debug, Clone)]
pub struct MediaEvent<'a> {
    pub kind: MediaEventKind,
    pub trigger: Option<Trigger<'a>>,
}

impl<'a> MediaEvent<'a> {
    pub fn new(kind: MediaEventKind) -> Self {
        Self {
            kind,
            trigger: None,
        }
    }

    pub fn triggered_by(mut self, trigger: Trigger<'a>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Attach an optional trigger.
    pub fn with_trigger(mut self, trigger: Option<Trigger<'a>>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn event_type(&self) -> MediaEventType {
        self.kind.event_type()
    }

    /// The native event at the root of the chain, if any.
    pub fn origin(&self) -> Option<&'a NativeEvent> {
        let mut next = self.trigger;
        while let Some(trigger) = next {
            match trigger {
                Trigger::Native(native) => return Some(native),
                Trigger::Media(event) => next = event.trigger,
            }
        }
        None
    }

    /// Names of every trigger from the immediate cause back to the root.
    pub fn trigger_chain(&self) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut next = self.trigger;
        while let Some(trigger) = next {
            chain.push(trigger.name());
            next = match trigger {
                Trigger::Native(_) => None,
                Trigger::Media(event) => event.trigger,
            };
        }
        chain
    }

    /// Whether any canonical event in the chain has the given type.
    pub fn is_triggered_by(&self, event_type: MediaEventType) -> bool {
        let mut next = self.trigger;
        while let Some(Trigger::Media(event)) = next {
            if event.event_type() == event_type {
                return true;
            }
            next = event.trigger;
        }
        false
    }
}

// ============================================================================
// Event Records & Bus
// ============================================================================

/// Owned snapshot of a dispatched canonical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: MediaEventType,
    pub kind: MediaEventKind,
    /// Adapter type that emitted the event (`video`, `hls`, `google-cast`).
    pub provider: Option<String>,
    pub trigger_chain: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn from_event(event: &MediaEvent<'_>, provider: Option<&str>) -> Self {
        Self {
            event_type: event.event_type(),
            kind: event.kind.clone(),
            provider: provider.map(str::to_string),
            trigger_chain: event
                .trigger_chain()
                .into_iter()
                .map(str::to_string)
                .collect(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the timestamp with one from an injected clock.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Broadcast channel for canonical event records.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a record. Returns the number of subscribers that received it;
    /// an error only means nobody is listening.
    pub fn emit(&self, record: EventRecord) -> Result<usize, SendError<EventRecord>> {
        self.sender.send(record)
    }

    pub fn subscribe(&self) -> Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiver wrapper that skips records not matching a filter.
pub struct EventStream {
    receiver: Receiver<EventRecord>,
    filter: Option<Box<dyn Fn(&EventRecord) -> bool + Send + Sync>>,
}

impl EventStream {
    pub fn new(receiver: Receiver<EventRecord>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only pass records of the listed types.
    pub fn only(self, types: &'static [MediaEventType]) -> Self {
        self.filter(move |record| types.contains(&record.event_type))
    }

    pub async fn recv(&mut self) -> Result<EventRecord, RecvError> {
        loop {
            let record = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&record) => continue,
                _ => return Ok(record),
            }
        }
    }

    /// Non-blocking receive; `None` when no matching record is queued.
    pub fn try_recv(&mut self) -> Option<Result<EventRecord, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(record) => match &self.filter {
                    Some(filter) if !filter(&record) => continue,
                    _ => return Some(Ok(record)),
                },
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
