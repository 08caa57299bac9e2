//! Canonical media state.
//!
//! [`MediaState`] is the record UI layers read. It is only ever changed by
//! folding canonical events into it through [`MediaState::apply`]; backends
//! never write it directly. [`MediaStore`] wraps it in a `watch` channel so
//! consumers can subscribe to snapshots.

use crate::events::{
    MediaErrorDetail, MediaEventKind, RemotePlaybackKind, RemotePlaybackState, StreamType,
};
use bridge_traits::surface::TimeRanges;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaState {
    pub source: Option<String>,
    pub provider: Option<String>,
    pub paused: bool,
    pub playing: bool,
    pub started: bool,
    pub ended: bool,
    pub waiting: bool,
    pub seeking: bool,
    pub can_play: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub buffered: TimeRanges,
    pub seekable: TimeRanges,
    pub played: TimeRanges,
    pub stream_type: StreamType,
    pub remote_playback_state: RemotePlaybackState,
    pub remote_playback_kind: Option<RemotePlaybackKind>,
    pub remote_device: Option<String>,
    pub picture_in_picture: bool,
    pub fullscreen: bool,
    pub error: Option<MediaErrorDetail>,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            source: None,
            provider: None,
            paused: true,
            playing: false,
            started: false,
            ended: false,
            waiting: false,
            seeking: false,
            can_play: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            buffered: TimeRanges::empty(),
            seekable: TimeRanges::empty(),
            played: TimeRanges::empty(),
            stream_type: StreamType::Unknown,
            remote_playback_state: RemotePlaybackState::Disconnected,
            remote_playback_kind: None,
            remote_device: None,
            picture_in_picture: false,
            fullscreen: false,
            error: None,
        }
    }
}

impl MediaState {
    /// Fold one canonical event into the state.
    pub fn apply(&mut self, kind: &MediaEventKind) {
        match kind {
            MediaEventKind::SourceChange { src } => {
                let keep_remote = (
                    self.remote_playback_state,
                    self.remote_playback_kind,
                    self.remote_device.take(),
                );
                let volume = (self.volume, self.muted);
                *self = MediaState {
                    source: src.clone(),
                    provider: self.provider.take(),
                    volume: volume.0,
                    muted: volume.1,
                    remote_playback_state: keep_remote.0,
                    remote_playback_kind: keep_remote.1,
                    remote_device: keep_remote.2,
                    ..MediaState::default()
                };
            }
            MediaEventKind::ProviderChange { provider } => self.provider = provider.clone(),
            MediaEventKind::LoadStart => {
                self.error = None;
                self.ended = false;
            }
            MediaEventKind::Emptied | MediaEventKind::Abort => {
                self.can_play = false;
                self.waiting = false;
            }
            MediaEventKind::LoadedMetadata(detail) => {
                self.duration = detail.duration;
                self.buffered = detail.buffered.clone();
                self.seekable = detail.seekable.clone();
            }
            MediaEventKind::CanPlay(detail) | MediaEventKind::CanPlayThrough(detail) => {
                self.can_play = true;
                self.waiting = false;
                self.duration = detail.duration;
                self.buffered = detail.buffered.clone();
                self.seekable = detail.seekable.clone();
            }
            MediaEventKind::Play => {
                self.paused = false;
                self.ended = false;
            }
            MediaEventKind::Playing => {
                self.paused = false;
                self.playing = true;
                self.started = true;
                self.waiting = false;
                self.ended = false;
            }
            MediaEventKind::Pause => {
                self.paused = true;
                self.playing = false;
                self.waiting = false;
            }
            MediaEventKind::Waiting => {
                self.waiting = true;
                self.playing = false;
            }
            MediaEventKind::Seeking { time } => {
                self.seeking = true;
                self.current_time = *time;
            }
            MediaEventKind::Seeked { time } => {
                self.seeking = false;
                self.current_time = *time;
            }
            MediaEventKind::TimeUpdate(detail) => {
                self.current_time = detail.current_time;
                self.played = detail.played.clone();
            }
            MediaEventKind::DurationChange { duration } => self.duration = *duration,
            MediaEventKind::VolumeChange(detail) => {
                self.volume = detail.volume;
                self.muted = detail.muted;
            }
            MediaEventKind::Progress(detail) => {
                self.buffered = detail.buffered.clone();
                self.seekable = detail.seekable.clone();
            }
            MediaEventKind::RateChange { rate } => self.playback_rate = *rate,
            MediaEventKind::Ended => {
                self.ended = true;
                self.paused = true;
                self.playing = false;
                self.waiting = false;
            }
            MediaEventKind::Error(detail) => {
                self.error = Some(detail.clone());
                self.waiting = false;
            }
            MediaEventKind::RemotePlaybackChange(detail) => {
                self.remote_playback_state = detail.state;
                self.remote_playback_kind = match detail.state {
                    RemotePlaybackState::Disconnected => None,
                    _ => Some(detail.kind),
                };
                self.remote_device = detail.device.clone();
            }
            MediaEventKind::StreamTypeChange { stream_type } => self.stream_type = *stream_type,
            MediaEventKind::PictureInPictureChange { active } => self.picture_in_picture = *active,
            MediaEventKind::FullscreenChange { active } => self.fullscreen = *active,
            MediaEventKind::LoadedData
            | MediaEventKind::Stalled
            | MediaEventKind::Suspend
            | MediaEventKind::ProviderSetup { .. }
            | MediaEventKind::LibLoadStart { .. }
            | MediaEventKind::LibLoaded { .. }
            | MediaEventKind::LibLoadError { .. }
            | MediaEventKind::Unsupported { .. } => {}
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote_playback_state != RemotePlaybackState::Disconnected
    }
}

/// Observable holder of the current [`MediaState`].
#[derive(Debug, Clone)]
pub struct MediaStore {
    sender: Arc<watch::Sender<MediaState>>,
}

impl MediaStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(MediaState::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn snapshot(&self) -> MediaState {
        self.sender.borrow().clone()
    }

    /// Read a field without cloning the whole record.
    pub fn read<R>(&self, f: impl FnOnce(&MediaState) -> R) -> R {
        f(&self.sender.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<MediaState> {
        self.sender.subscribe()
    }

    pub fn apply(&self, kind: &MediaEventKind) {
        self.sender.send_modify(|state| state.apply(kind));
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new()
    }
}
