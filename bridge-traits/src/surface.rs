//! Playback Surface Abstraction
//!
//! The host owns the actual media element (a `<video>` tag, a native player
//! view, an embedded decoder window). The core only ever talks to it through
//! [`MediaElement`]: property reads, property writes, and a listener
//! registry for the element's native event stream.
//!
//! Native events are delivered synchronously on the host's event thread. A
//! listener must never assume it is called with any lock held, and
//! implementations must not hold internal locks while invoking listeners,
//! since listeners read element properties back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{BridgeError, Result};

// ============================================================================
// Time Ranges
// ============================================================================

/// Ordered, non-overlapping list of `[start, end]` ranges in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRanges(Vec<(f64, f64)>);

impl TimeRanges {
    /// Empty range set.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// A single `[start, end]` range.
    pub fn single(start: f64, end: f64) -> Self {
        Self(vec![(start, end)])
    }

    /// Build from a list of ranges, sorting and merging overlaps.
    pub fn from_ranges(mut ranges: Vec<(f64, f64)>) -> Self {
        ranges.retain(|(start, end)| end >= start);
        ranges.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self(merged)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[(f64, f64)] {
        &self.0
    }

    /// Start of the first range.
    pub fn start(&self) -> Option<f64> {
        self.0.first().map(|(start, _)| *start)
    }

    /// End of the last range.
    pub fn end(&self) -> Option<f64> {
        self.0.last().map(|(_, end)| *end)
    }
}

// ============================================================================
// Native Events
// ============================================================================

/// Native events emitted by a media element or by an engine bound to it.
///
/// Engine and remote events are carried through the same type so that a
/// canonical event can always point back at the thing that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEventKind {
    LoadStart,
    Abort,
    Emptied,
    Error,
    LoadedData,
    LoadedMetadata,
    CanPlay,
    CanPlayThrough,
    DurationChange,
    Play,
    Progress,
    Stalled,
    Suspend,
    Pause,
    Playing,
    RateChange,
    Seeked,
    Seeking,
    Ended,
    VolumeChange,
    Waiting,
    TimeUpdate,
    EnterPictureInPicture,
    LeavePictureInPicture,
    FullscreenChange,
    FullscreenError,
    /// Event from an engine attached to the element (e.g. a streaming engine).
    Engine(&'static str),
    /// Event from a remote session object.
    Remote(&'static str),
}

impl NativeEventKind {
    /// Host-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            NativeEventKind::LoadStart => "loadstart",
            NativeEventKind::Abort => "abort",
            NativeEventKind::Emptied => "emptied",
            NativeEventKind::Error => "error",
            NativeEventKind::LoadedData => "loadeddata",
            NativeEventKind::LoadedMetadata => "loadedmetadata",
            NativeEventKind::CanPlay => "canplay",
            NativeEventKind::CanPlayThrough => "canplaythrough",
            NativeEventKind::DurationChange => "durationchange",
            NativeEventKind::Play => "play",
            NativeEventKind::Progress => "progress",
            NativeEventKind::Stalled => "stalled",
            NativeEventKind::Suspend => "suspend",
            NativeEventKind::Pause => "pause",
            NativeEventKind::Playing => "playing",
            NativeEventKind::RateChange => "ratechange",
            NativeEventKind::Seeked => "seeked",
            NativeEventKind::Seeking => "seeking",
            NativeEventKind::Ended => "ended",
            NativeEventKind::VolumeChange => "volumechange",
            NativeEventKind::Waiting => "waiting",
            NativeEventKind::TimeUpdate => "timeupdate",
            NativeEventKind::EnterPictureInPicture => "enterpictureinpicture",
            NativeEventKind::LeavePictureInPicture => "leavepictureinpicture",
            NativeEventKind::FullscreenChange => "fullscreenchange",
            NativeEventKind::FullscreenError => "fullscreenerror",
            NativeEventKind::Engine(name) | NativeEventKind::Remote(name) => name,
        }
    }
}

impl fmt::Display for NativeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single native event occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    pub kind: NativeEventKind,
    /// Optional free-form payload supplied by the emitter.
    pub payload: Option<serde_json::Value>,
}

impl NativeEvent {
    pub fn new(kind: NativeEventKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Error object attached to the element after a native `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeMediaError {
    /// Host error code (1 abort, 2 network, 3 decode, 4 source not supported).
    pub code: u16,
    pub message: String,
}

/// Identifier returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Callback invoked for each native event.
pub type NativeListener = Arc<dyn Fn(&NativeEvent) + Send + Sync>;

// ============================================================================
// Element State
// ============================================================================

/// Mirrors `HTMLMediaElement.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// Mirrors `HTMLMediaElement.networkState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkState {
    Empty = 0,
    Idle = 1,
    Loading = 2,
    NoSource = 3,
}

/// Element `preload` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    #[default]
    Metadata,
    Auto,
}

impl Preload {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preload::None => "none",
            Preload::Metadata => "metadata",
            Preload::Auto => "auto",
        }
    }
}

/// Opaque live stream object handed to the host (camera capture, WebRTC track).
///
/// Equality is identity: two handles are equal only when they refer to the
/// same host object.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: u64,
    label: Arc<str>,
}

impl StreamHandle {
    pub fn new(id: u64, label: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.label, &other.label)
    }
}

impl Eq for StreamHandle {}

// ============================================================================
// Media Element Trait
// ============================================================================

/// Host media element that an adapter attaches to.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::surface::{MediaElement, NativeEventKind};
/// use std::sync::Arc;
///
/// fn watch_errors(element: &dyn MediaElement) {
///     element.add_event_listener(
///         NativeEventKind::Error,
///         Arc::new(|event| println!("native error: {:?}", event)),
///     );
/// }
/// ```
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Register a listener for one native event kind.
    fn add_event_listener(&self, kind: NativeEventKind, listener: NativeListener) -> ListenerId;

    /// Remove a listener. Removing an unknown id is a no-op.
    fn remove_event_listener(&self, id: ListenerId);

    // ------------------------------------------------------------------
    // Property reads
    // ------------------------------------------------------------------

    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn current_time(&self) -> f64;
    /// `NaN` until metadata is known, `INFINITY` for unbounded live streams.
    fn duration(&self) -> f64;
    fn volume(&self) -> f64;
    fn muted(&self) -> bool;
    fn playback_rate(&self) -> f64;
    fn ready_state(&self) -> ReadyState;
    fn network_state(&self) -> NetworkState;
    fn buffered(&self) -> TimeRanges;
    fn seekable(&self) -> TimeRanges;
    fn played(&self) -> TimeRanges;
    fn error(&self) -> Option<NativeMediaError>;
    /// Resolved source URL currently assigned to the element.
    fn current_src(&self) -> Option<String>;

    /// Whether the host can decode the given MIME type natively.
    fn can_play_type(&self, mime_type: &str) -> bool;

    // ------------------------------------------------------------------
    // Property writes
    // ------------------------------------------------------------------

    fn set_volume(&self, volume: f64);
    fn set_muted(&self, muted: bool);
    fn set_current_time(&self, time: f64);
    fn set_playback_rate(&self, rate: f64);
    fn set_plays_inline(&self, inline: bool);
    fn set_preload(&self, preload: Preload);
    /// Assign (or clear with `None`) the element's source URL.
    fn set_src(&self, src: Option<&str>);
    /// Assign (or clear with `None`) a live stream object.
    fn set_src_object(&self, stream: Option<&StreamHandle>);
    /// Restart the element's resource selection algorithm.
    fn load(&self);

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;

    // ------------------------------------------------------------------
    // Optional host capabilities
    // ------------------------------------------------------------------

    fn supports_fullscreen(&self) -> bool {
        false
    }

    async fn request_fullscreen(&self) -> Result<()> {
        Err(BridgeError::NotAvailable("fullscreen".to_string()))
    }

    async fn exit_fullscreen(&self) -> Result<()> {
        Err(BridgeError::NotAvailable("fullscreen".to_string()))
    }

    fn supports_picture_in_picture(&self) -> bool {
        false
    }

    async fn request_picture_in_picture(&self) -> Result<()> {
        Err(BridgeError::NotAvailable("picture-in-picture".to_string()))
    }

    async fn exit_picture_in_picture(&self) -> Result<()> {
        Err(BridgeError::NotAvailable("picture-in-picture".to_string()))
    }

    /// Wireless route picker (AirPlay-style) availability.
    fn supports_remote_playback(&self) -> bool {
        false
    }

    async fn prompt_remote_playback(&self) -> Result<()> {
        Err(BridgeError::NotAvailable("remote-playback".to_string()))
    }
}
