//! Shared context handed to loaders and adapters.

use crate::audio_graph::SharedAudioGraph;
use crate::delegate::MediaDelegate;
use crate::library::LibraryLoader;
use crate::probe::CapabilityProbes;
use crate::tracks::{MediaMetadata, TextTrackList};
use bridge_traits::FrameScheduler;
use core_runtime::config::{PlaybackSettings, RuntimeConfig};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Clone)]
pub struct ProviderContext {
    pub settings: Arc<PlaybackSettings>,
    pub delegate: Arc<MediaDelegate>,
    pub frame_scheduler: Arc<dyn FrameScheduler>,
    pub libraries: Arc<LibraryLoader>,
    pub audio_graph: Option<Arc<SharedAudioGraph>>,
    pub probes: Arc<CapabilityProbes>,
    pub text_tracks: Arc<TextTrackList>,
    pub metadata: Arc<RwLock<MediaMetadata>>,
}

impl ProviderContext {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_probes(config, CapabilityProbes::new())
    }

    pub fn with_probes(config: &RuntimeConfig, probes: CapabilityProbes) -> Self {
        let audio_graph = if config.settings.features.audio_gain {
            config
                .audio_context_factory
                .clone()
                .map(SharedAudioGraph::new)
        } else {
            None
        };

        Self {
            settings: Arc::new(config.settings.clone()),
            delegate: Arc::new(MediaDelegate::with_clock(
                config.settings.event_buffer_size,
                Arc::clone(&config.clock),
            )),
            frame_scheduler: Arc::clone(&config.frame_scheduler),
            libraries: Arc::new(LibraryLoader::new(config.script_host.clone())),
            audio_graph,
            probes: Arc::new(probes),
            text_tracks: Arc::new(TextTrackList::new()),
            metadata: Arc::new(RwLock::new(MediaMetadata::default())),
        }
    }

    /// `false` when the host has no real playback environment (server
    /// rendering). Predicates still answer; loads fail later.
    pub fn is_interactive(&self) -> bool {
        self.libraries
            .host()
            .map(|host| host.is_interactive())
            .unwrap_or(true)
    }
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("settings", &self.settings)
            .field("audio_graph", &self.audio_graph.is_some())
            .field("probes", &self.probes)
            .finish()
    }
}
