//! # Host Bridge Traits
//!
//! Host abstraction traits for the media provider runtime.
//!
//! ## Overview
//!
//! The provider runtime never touches a concrete media element, script loader,
//! audio graph or cast SDK. Each of those is a capability the host application
//! supplies by implementing one of the traits below.
//!
//! ## Traits
//!
//! ### Playback Surface
//! - [`MediaElement`](surface::MediaElement) - Element properties, writes and native event listeners
//! - [`FrameScheduler`](frame::FrameScheduler) - Per-frame callbacks for high-frequency polling
//!
//! ### Backend Libraries
//! - [`ScriptHost`](script::ScriptHost) - Fetches external engine libraries and resolves their globals
//! - [`AudioContextFactory`](audio::AudioContextFactory) - Shared audio graph for gain control
//!
//! ### Remote Playback
//! - [`CastContext`](cast::CastContext) - Session lifecycle
//! - [`CastSession`](cast::CastSession) - Media loading on a receiver
//! - [`RemotePlayer`](cast::RemotePlayer) - Receiver player mirror and controller
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Threading
//!
//! Every trait is `Send + Sync`. The runtime itself is driven from a single
//! cooperative thread, but hosts are free to deliver callbacks from any thread
//! as long as callbacks for one element are not delivered concurrently.

pub mod audio;
pub mod cast;
pub mod error;
pub mod frame;
pub mod script;
pub mod surface;
pub mod time;

pub use error::BridgeError;

pub use audio::{AudioContext, AudioContextFactory, GainNode, SourceNode};
pub use cast::{
    CastContext, CastErrorCode, CastLoadRequest, CastMediaInfo, CastMetadata, CastSession,
    CastSessionState, CastStreamType, CastTrack, RemotePlayer, RemotePlayerEventKind,
    RemotePlayerState, RemoteStreamType,
};
pub use frame::{FrameCallback, FrameHandle, FrameScheduler, IntervalFrameScheduler};
pub use script::{GlobalValue, ScriptHost};
pub use surface::{
    ListenerId, MediaElement, NativeEvent, NativeEventKind, NativeListener, NativeMediaError,
    NetworkState, Preload, ReadyState, StreamHandle, TimeRanges,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
