//! Remote Cast Session Abstraction
//!
//! Mirrors the objects a cast SDK exposes to a sender application:
//!
//! - [`CastContext`]: process-wide entry point; owns the current session and
//!   reports session-state changes.
//! - [`CastSession`]: a connection to one receiver device; loads media.
//! - [`RemotePlayer`]: observable mirror of the receiver's player plus its
//!   controller actions.
//!
//! Session actions report failure as a [`CastErrorCode`]; success is `None`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::surface::ListenerId;

// ============================================================================
// Codes & States
// ============================================================================

/// Error codes returned by cast session actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastErrorCode {
    Cancel,
    Timeout,
    ApiNotInitialized,
    InvalidParameter,
    ExtensionNotCompatible,
    ExtensionMissing,
    ReceiverUnavailable,
    SessionError,
    ChannelError,
    LoadMediaFailed,
}

impl fmt::Display for CastErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CastErrorCode::Cancel => "cancel",
            CastErrorCode::Timeout => "timeout",
            CastErrorCode::ApiNotInitialized => "api_not_initialized",
            CastErrorCode::InvalidParameter => "invalid_parameter",
            CastErrorCode::ExtensionNotCompatible => "extension_not_compatible",
            CastErrorCode::ExtensionMissing => "extension_missing",
            CastErrorCode::ReceiverUnavailable => "receiver_unavailable",
            CastErrorCode::SessionError => "session_error",
            CastErrorCode::ChannelError => "channel_error",
            CastErrorCode::LoadMediaFailed => "load_media_failed",
        };
        f.write_str(name)
    }
}

/// Session lifecycle as reported by the cast context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastSessionState {
    NoSession,
    SessionStarting,
    SessionStarted,
    SessionStartFailed,
    SessionEnding,
    SessionEnded,
    SessionResumed,
}

/// Receiver player state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemotePlayerState {
    Idle,
    Playing,
    Paused,
    Buffering,
}

/// Stream type reported by the receiver for the loaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteStreamType {
    Buffered,
    Live,
    Other,
}

/// Observable properties of the remote player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemotePlayerEventKind {
    IsConnectedChanged,
    IsMediaLoadedChanged,
    CanControlVolumeChanged,
    CanSeekChanged,
    DurationChanged,
    IsMutedChanged,
    VolumeLevelChanged,
    IsPausedChanged,
    LiveSeekableRangeChanged,
    PlayerStateChanged,
}

impl RemotePlayerEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            RemotePlayerEventKind::IsConnectedChanged => "isConnectedChanged",
            RemotePlayerEventKind::IsMediaLoadedChanged => "isMediaLoadedChanged",
            RemotePlayerEventKind::CanControlVolumeChanged => "canControlVolumeChanged",
            RemotePlayerEventKind::CanSeekChanged => "canSeekChanged",
            RemotePlayerEventKind::DurationChanged => "durationChanged",
            RemotePlayerEventKind::IsMutedChanged => "isMutedChanged",
            RemotePlayerEventKind::VolumeLevelChanged => "volumeLevelChanged",
            RemotePlayerEventKind::IsPausedChanged => "isPausedChanged",
            RemotePlayerEventKind::LiveSeekableRangeChanged => "liveSeekableRangeChanged",
            RemotePlayerEventKind::PlayerStateChanged => "playerStateChanged",
        }
    }
}

pub type SessionStateListener = Arc<dyn Fn(CastSessionState) + Send + Sync>;
pub type RemotePlayerListener = Arc<dyn Fn(RemotePlayerEventKind) + Send + Sync>;

// ============================================================================
// Load Request
// ============================================================================

/// Text track pushed to the receiver alongside the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastTrack {
    pub track_id: u32,
    /// `subtitles`, `captions`, `descriptions`, `chapters`, `metadata`.
    pub subtype: String,
    pub name: String,
    pub language: Option<String>,
    pub track_content_id: String,
    pub track_content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CastMetadata {
    pub title: Option<String>,
    pub poster: Option<String>,
}

/// Receiver stream type hint sent with a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CastStreamType {
    Buffered,
    Live,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastMediaInfo {
    pub src: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub stream_type: CastStreamType,
    pub tracks: Vec<CastTrack>,
    pub metadata: CastMetadata,
}

/// Session load request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastLoadRequest {
    pub media_info: CastMediaInfo,
    pub autoplay: bool,
    pub current_time: f64,
    pub active_track_ids: Vec<u32>,
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait CastContext: Send + Sync {
    /// Whether the cast framework is usable in this environment.
    fn is_available(&self) -> bool;

    fn session_state(&self) -> CastSessionState;

    fn current_session(&self) -> Option<Arc<dyn CastSession>>;

    /// Shows the device picker and starts a session. `None` on success.
    async fn request_session(&self) -> Option<CastErrorCode>;

    /// End the current session; `stop_casting` also stops receiver playback.
    fn end_current_session(&self, stop_casting: bool);

    fn add_session_state_listener(&self, listener: SessionStateListener) -> ListenerId;

    fn remove_session_state_listener(&self, id: ListenerId);

    fn remote_player(&self) -> Arc<dyn RemotePlayer>;
}

#[async_trait]
pub trait CastSession: Send + Sync {
    fn device_name(&self) -> Option<String>;

    /// Content id (source URL) of the media currently loaded on the receiver.
    fn media_content_id(&self) -> Option<String>;

    async fn load_media(&self, request: CastLoadRequest) -> Option<CastErrorCode>;

    async fn edit_tracks(&self, active_track_ids: Vec<u32>) -> Option<CastErrorCode>;
}

pub trait RemotePlayer: Send + Sync {
    fn is_connected(&self) -> bool;
    fn is_media_loaded(&self) -> bool;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn volume_level(&self) -> f64;
    fn is_muted(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn can_seek(&self) -> bool;
    fn can_control_volume(&self) -> bool;
    fn player_state(&self) -> RemotePlayerState;
    fn stream_type(&self) -> Option<RemoteStreamType>;
    fn live_seekable_range(&self) -> Option<(f64, f64)>;

    fn add_listener(&self, kind: RemotePlayerEventKind, listener: RemotePlayerListener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);

    // Controller actions
    fn play_or_pause(&self);
    fn stop(&self);
    fn seek(&self, time: f64);
    fn set_volume_level(&self, volume: f64);
    fn mute_or_unmute(&self);
}
