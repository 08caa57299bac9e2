//! # Runtime Configuration
//!
//! Settings and host bridges the provider runtime needs, assembled through a
//! builder with fail-fast validation.
//!
//! ## Required Dependencies
//!
//! - `FrameScheduler` - drives high-frequency time polling
//!
//! ## Optional Dependencies
//!
//! - `ScriptHost` - fetches external engine libraries (HLS)
//! - `AudioContextFactory` - shared audio graph for gain control
//! - `CastContext` - remote playback sessions
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{PlaybackSettings, RuntimeConfig};
//! use bridge_traits::IntervalFrameScheduler;
//! use std::sync::Arc;
//!
//! let config = RuntimeConfig::builder()
//!     .frame_scheduler(Arc::new(IntervalFrameScheduler::default()))
//!     .settings(PlaybackSettings::from_json(r#"{"preload":"auto"}"#)?)
//!     .build()?;
//! ```
//!
//! Missing required bridges produce an actionable error:
//!
//! ```
//! use core_runtime::config::RuntimeConfig;
//!
//! let err = RuntimeConfig::builder().build().unwrap_err();
//! assert!(err.to_string().contains("FrameScheduler"));
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioContextFactory, CastContext, Clock, FrameScheduler, Preload, ScriptHost, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const LOADER_GOOGLE_CAST: &str = "google-cast";
pub const LOADER_HLS: &str = "hls";
pub const LOADER_VIDEO: &str = "video";
pub const LOADER_AUDIO: &str = "audio";

/// Loader names the runtime knows how to build.
pub const KNOWN_LOADERS: &[&str] = &[LOADER_GOOGLE_CAST, LOADER_HLS, LOADER_VIDEO, LOADER_AUDIO];

pub const DEFAULT_HLS_LIBRARY_URL: &str =
    "https://cdn.jsdelivr.net/npm/hls.js@^1.5.0/dist/hls.min.js";
pub const DEFAULT_HLS_GLOBAL_SYMBOL: &str = "Hls";
/// Stock media receiver application.
pub const DEFAULT_CAST_RECEIVER_APP_ID: &str = "CC1AD845";

// ============================================================================
// Settings
// ============================================================================

/// Optional functionality toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Register the cast loader (requires a `CastContext`)
    #[serde(default)]
    pub remote_playback: bool,

    /// Offer the audio-gain capability on native adapters
    #[serde(default = "default_true")]
    pub audio_gain: bool,

    #[serde(default = "default_true")]
    pub picture_in_picture: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            remote_playback: false,
            audio_gain: true,
            picture_in_picture: true,
        }
    }
}

/// Where the adaptive-streaming engine comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsLibrarySettings {
    #[serde(default = "default_hls_url")]
    pub url: String,

    /// Global the script registers once evaluated.
    #[serde(default = "default_hls_symbol")]
    pub global_symbol: String,
}

impl Default for HlsLibrarySettings {
    fn default() -> Self {
        Self {
            url: default_hls_url(),
            global_symbol: default_hls_symbol(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastSettings {
    #[serde(default = "default_receiver_app_id")]
    pub receiver_app_id: String,
}

impl Default for CastSettings {
    fn default() -> Self {
        Self {
            receiver_app_id: default_receiver_app_id(),
        }
    }
}

/// Serializable playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default)]
    pub preload: Preload,

    /// Loader names in selection priority order. Declaration order wins when
    /// several loaders accept a source.
    #[serde(default = "default_loader_order")]
    pub loader_order: Vec<String>,

    #[serde(default)]
    pub hls: HlsLibrarySettings,

    #[serde(default)]
    pub cast: CastSettings,

    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    #[serde(default)]
    pub features: FeatureFlags,
}

fn default_true() -> bool {
    true
}

fn default_hls_url() -> String {
    DEFAULT_HLS_LIBRARY_URL.to_string()
}

fn default_hls_symbol() -> String {
    DEFAULT_HLS_GLOBAL_SYMBOL.to_string()
}

fn default_receiver_app_id() -> String {
    DEFAULT_CAST_RECEIVER_APP_ID.to_string()
}

fn default_loader_order() -> Vec<String> {
    KNOWN_LOADERS.iter().map(|name| name.to_string()).collect()
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            preload: Preload::default(),
            loader_order: default_loader_order(),
            hls: HlsLibrarySettings::default(),
            cast: CastSettings::default(),
            event_buffer_size: default_event_buffer_size(),
            features: FeatureFlags::default(),
        }
    }
}

impl PlaybackSettings {
    /// Parse settings from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.loader_order.is_empty() {
            return Err(Error::Config(
                "Loader order cannot be empty".to_string(),
            ));
        }

        for (index, name) in self.loader_order.iter().enumerate() {
            if !KNOWN_LOADERS.contains(&name.as_str()) {
                return Err(Error::Config(format!(
                    "Unknown loader '{}'; expected one of {}",
                    name,
                    KNOWN_LOADERS.join(", ")
                )));
            }
            if self.loader_order[..index].contains(name) {
                return Err(Error::Config(format!("Loader '{}' listed twice", name)));
            }
        }

        if self.hls.url.trim().is_empty() || self.hls.global_symbol.trim().is_empty() {
            return Err(Error::Config(
                "HLS library url and global symbol cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn loader_enabled(&self, name: &str) -> bool {
        self.loader_order.iter().any(|n| n == name)
    }
}

// ============================================================================
// Runtime Configuration
// ============================================================================

/// Settings plus the host bridges. Use [`RuntimeConfigBuilder`].
#[derive(Clone)]
pub struct RuntimeConfig {
    pub settings: PlaybackSettings,
    pub frame_scheduler: Arc<dyn FrameScheduler>,
    pub script_host: Option<Arc<dyn ScriptHost>>,
    pub audio_context_factory: Option<Arc<dyn AudioContextFactory>>,
    pub cast_context: Option<Arc<dyn CastContext>>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("settings", &self.settings)
            .field("frame_scheduler", &"FrameScheduler { ... }")
            .field(
                "script_host",
                &self.script_host.as_ref().map(|_| "ScriptHost { ... }"),
            )
            .field(
                "audio_context_factory",
                &self
                    .audio_context_factory
                    .as_ref()
                    .map(|_| "AudioContextFactory { ... }"),
            )
            .field(
                "cast_context",
                &self.cast_context.as_ref().map(|_| "CastContext { ... }"),
            )
            .finish()
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Checks settings and that enabled features have their bridges.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;

        if self.settings.features.remote_playback && self.cast_context.is_none() {
            return Err(Error::Config(
                "Remote playback enabled but no CastContext provided. \
                 Disable the feature or inject a CastContext implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct RuntimeConfigBuilder {
    settings: Option<PlaybackSettings>,
    frame_scheduler: Option<Arc<dyn FrameScheduler>>,
    script_host: Option<Arc<dyn ScriptHost>>,
    audio_context_factory: Option<Arc<dyn AudioContextFactory>>,
    cast_context: Option<Arc<dyn CastContext>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RuntimeConfigBuilder {
    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn frame_scheduler(mut self, scheduler: Arc<dyn FrameScheduler>) -> Self {
        self.frame_scheduler = Some(scheduler);
        self
    }

    pub fn script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    pub fn audio_context_factory(mut self, factory: Arc<dyn AudioContextFactory>) -> Self {
        self.audio_context_factory = Some(factory);
        self
    }

    /// Also switches the remote playback feature on.
    pub fn cast_context(mut self, context: Arc<dyn CastContext>) -> Self {
        self.cast_context = Some(context);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<RuntimeConfig> {
        let frame_scheduler = self.frame_scheduler.ok_or_else(|| Error::CapabilityMissing {
            capability: "FrameScheduler".to_string(),
            message: "FrameScheduler implementation is required for time polling. \
                      Web: wrap requestAnimationFrame. \
                      Native: use IntervalFrameScheduler or a display-link callback."
                .to_string(),
        })?;

        let mut settings = self.settings.unwrap_or_default();
        if self.cast_context.is_some() {
            settings.features.remote_playback = true;
        }

        let config = RuntimeConfig {
            settings,
            frame_scheduler,
            script_host: self.script_host,
            audio_context_factory: self.audio_context_factory,
            cast_context: self.cast_context,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::IntervalFrameScheduler;

    fn scheduler() -> Arc<dyn FrameScheduler> {
        Arc::new(IntervalFrameScheduler::default())
    }

    #[test]
    fn test_missing_frame_scheduler_is_capability_error() {
        let err = RuntimeConfig::builder().build().unwrap_err();
        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "FrameScheduler"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::builder()
            .frame_scheduler(scheduler())
            .build()
            .unwrap();

        assert_eq!(config.settings.preload, Preload::Metadata);
        assert_eq!(
            config.settings.loader_order,
            vec!["google-cast", "hls", "video", "audio"]
        );
        assert_eq!(config.settings.hls.global_symbol, "Hls");
        assert!(!config.settings.features.remote_playback);
        assert!(config.script_host.is_none());
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings = PlaybackSettings::from_json(
            r#"{"preload":"auto","loader_order":["video","hls"],"features":{"audio_gain":false}}"#,
        )
        .unwrap();

        assert_eq!(settings.preload, Preload::Auto);
        assert_eq!(settings.loader_order, vec!["video", "hls"]);
        assert!(!settings.features.audio_gain);
        assert!(settings.features.picture_in_picture);
        assert_eq!(settings.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(settings.loader_enabled("hls"));
        assert!(!settings.loader_enabled("audio"));
    }

    #[test]
    fn test_unknown_loader_rejected() {
        let err = PlaybackSettings::from_json(r#"{"loader_order":["dash"]}"#).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("dash")));
    }

    #[test]
    fn test_duplicate_loader_rejected() {
        let err = PlaybackSettings::from_json(r#"{"loader_order":["video","video"]}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_settings_error() {
        let err = PlaybackSettings::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }

    #[test]
    fn test_remote_playback_requires_cast_context() {
        let mut settings = PlaybackSettings::default();
        settings.features.remote_playback = true;

        let err = RuntimeConfig::builder()
            .frame_scheduler(scheduler())
            .settings(settings)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("CastContext")));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let settings = PlaybackSettings {
            event_buffer_size: 0,
            ..PlaybackSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
