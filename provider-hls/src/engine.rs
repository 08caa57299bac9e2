//! Engine contract the host's streaming library is adapted to.
//!
//! A host loading a script engine publishes an `Arc<dyn HlsEngineFactory>`
//! under the configured global symbol; a statically linked engine hands the
//! factory to the loader directly.

use crate::error::HlsError;
use bridge_traits::{ListenerId, MediaElement, NativeEvent, NativeEventKind};
use core_runtime::events::MediaErrorCode;
use serde_json::json;
use std::sync::Arc;

/// Engine error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsErrorKind {
    Network,
    Media,
    Other,
}

impl HlsErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HlsErrorKind::Network => "networkError",
            HlsErrorKind::Media => "mediaError",
            HlsErrorKind::Other => "otherError",
        }
    }

    pub fn media_error_code(&self) -> MediaErrorCode {
        match self {
            HlsErrorKind::Network => MediaErrorCode::Network,
            HlsErrorKind::Media => MediaErrorCode::Decode,
            HlsErrorKind::Other => MediaErrorCode::InvalidResource,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HlsEvent {
    ManifestParsed {
        levels: usize,
    },
    LevelLoaded {
        live: bool,
        total_duration: f64,
    },
    Error {
        fatal: bool,
        kind: HlsErrorKind,
        details: String,
    },
}

impl HlsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HlsEvent::ManifestParsed { .. } => "hlsManifestParsed",
            HlsEvent::LevelLoaded { .. } => "hlsLevelLoaded",
            HlsEvent::Error { .. } => "hlsError",
        }
    }

    /// The engine event as a trigger for canonical events.
    pub fn to_native(&self) -> NativeEvent {
        let payload = match self {
            HlsEvent::ManifestParsed { levels } => json!({ "levels": levels }),
            HlsEvent::LevelLoaded {
                live,
                total_duration,
            } => json!({ "live": live, "totalduration": total_duration }),
            HlsEvent::Error {
                fatal,
                kind,
                details,
            } => json!({ "fatal": fatal, "type": kind.as_str(), "details": details }),
        };
        NativeEvent::new(NativeEventKind::Engine(self.name())).with_payload(payload)
    }
}

pub type HlsListener = Arc<dyn Fn(&HlsEvent) + Send + Sync>;

pub trait HlsEngineFactory: Send + Sync {
    /// Whether the engine can run in this environment.
    fn is_supported(&self) -> bool;

    fn create(&self) -> std::result::Result<Arc<dyn HlsEngine>, HlsError>;
}

/// One engine instance, bound to at most one element.
pub trait HlsEngine: Send + Sync {
    fn attach_media(&self, element: Arc<dyn MediaElement>);

    fn detach_media(&self);

    fn load_source(&self, url: &str);

    /// Begin fetching segments; negative `start_position` means "default".
    fn start_load(&self, start_position: f64);

    /// Stop fetching and drop buffered segments of the current source.
    fn stop_load(&self);

    fn destroy(&self);

    fn add_listener(&self, listener: HlsListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}
