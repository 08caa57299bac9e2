//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`RuntimeConfig`] into a [`ProviderRuntime`]: it builds
//! the shared provider context, registers loaders in the configured priority
//! order and, with the `cast` feature, binds the remote-playback coordinator to
//! the runtime so a cast session can take playback over and hand it back.
//!
//! Loaders follow `settings.loader_order` (default `google-cast, hls, video,
//! audio`). A loader whose crate is not compiled in, or whose bridge the host
//! did not inject, is skipped.
//!
//! ```ignore
//! use core_service::MediaService;
//! use core_provider::Source;
//!
//! let service = MediaService::new(config)?;
//! service.mount(element);
//! service.load(Source::untyped("https://cdn.example.com/master.m3u8")).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::MediaElement;
use core_provider::probe::CapabilityProbes;
use core_provider::tracks::{MediaMetadata, TextTrackList};
use core_provider::{
    AudioLoader, LoaderRegistry, ProviderAdapter, ProviderContext, ProviderRuntime, Source,
    VideoLoader,
};
use core_runtime::config::{
    RuntimeConfig, LOADER_AUDIO, LOADER_GOOGLE_CAST, LOADER_HLS, LOADER_VIDEO,
};
use core_runtime::events::{EventRecord, Receiver};
use core_runtime::state::MediaState;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(feature = "cast")]
pub use provider_cast::CastCoordinator;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct MediaService {
    ctx: ProviderContext,
    runtime: Arc<ProviderRuntime>,
    #[cfg(feature = "cast")]
    cast: Option<Arc<CastCoordinator>>,
}

impl MediaService {
    /// Build the service from a validated configuration.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_probes(config, CapabilityProbes::new())
    }

    /// Build the service with host-specific capability probes.
    pub fn with_probes(config: RuntimeConfig, probes: CapabilityProbes) -> Result<Self> {
        config.validate()?;
        let ctx = ProviderContext::with_probes(&config, probes);
        let loaders = Loaders::build(&config, &ctx);
        if loaders.registry.is_empty() {
            return Err(CoreError::InitializationFailed(
                "No loader in the configured order is available".to_string(),
            ));
        }

        let runtime = Arc::new(ProviderRuntime::new(ctx.clone(), loaders.registry));

        #[cfg(feature = "cast")]
        if let Some(coordinator) = &loaders.cast {
            let handoff: Arc<dyn core_provider::PlaybackHandoff> = runtime.clone();
            coordinator.bind_handoff(Arc::downgrade(&handoff));
            coordinator.attach();
        }

        info!(loaders = ?runtime.registry().names(), "media service ready");
        Ok(Self {
            ctx,
            runtime,
            #[cfg(feature = "cast")]
            cast: loaders.cast,
        })
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    pub fn runtime(&self) -> &Arc<ProviderRuntime> {
        &self.runtime
    }

    /// Registered loader names in selection order.
    pub fn loader_names(&self) -> Vec<&'static str> {
        self.runtime.registry().names()
    }

    /// Subscribe to canonical event records.
    pub fn events(&self) -> Receiver<EventRecord> {
        self.ctx.delegate.bus().subscribe()
    }

    pub fn state(&self) -> MediaState {
        self.ctx.delegate.snapshot()
    }

    pub fn text_tracks(&self) -> &Arc<TextTrackList> {
        &self.ctx.text_tracks
    }

    /// Title and poster forwarded to remote receivers.
    pub fn set_metadata(&self, metadata: MediaMetadata) {
        *self.ctx.metadata.write() = metadata;
    }

    pub fn adapter(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.runtime.adapter()
    }

    pub fn mount(&self, surface: Arc<dyn MediaElement>) {
        self.runtime.mount(surface);
    }

    pub async fn unmount(&self) {
        self.runtime.unmount().await;
    }

    pub async fn load(&self, source: Source) -> Result<()> {
        self.runtime.load(source).await?;
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        self.runtime.play().await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.runtime.pause().await?;
        Ok(())
    }

    /// Tear down the active adapter and stop following cast sessions.
    pub async fn destroy(&self) {
        #[cfg(feature = "cast")]
        if let Some(coordinator) = &self.cast {
            coordinator.detach();
        }
        self.runtime.destroy().await;
    }
}

#[cfg(feature = "cast")]
impl MediaService {
    pub fn cast_coordinator(&self) -> Option<&Arc<CastCoordinator>> {
        self.cast.as_ref()
    }

    /// Show the receiver picker and start a session.
    pub async fn request_cast_session(&self) -> Result<()> {
        let coordinator = self.require_cast()?;
        coordinator.request_session().await?;
        Ok(())
    }

    /// End the session and continue playback locally.
    pub async fn end_cast_session(&self) -> Result<()> {
        let coordinator = self.require_cast()?;
        coordinator.end_session().await;
        Ok(())
    }

    fn require_cast(&self) -> Result<&Arc<CastCoordinator>> {
        self.cast.as_ref().ok_or_else(|| CoreError::CapabilityMissing {
            capability: "CastContext".to_string(),
            message: "Remote playback is disabled or no cast context was injected".to_string(),
        })
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService")
            .field("loaders", &self.loader_names())
            .field("provider", &self.adapter().map(|adapter| adapter.kind()))
            .finish()
    }
}

// ============================================================================
// Loader registration
// ============================================================================

struct Loaders {
    registry: LoaderRegistry,
    #[cfg(feature = "cast")]
    cast: Option<Arc<CastCoordinator>>,
}

impl Loaders {
    fn build(config: &RuntimeConfig, ctx: &ProviderContext) -> Self {
        let mut loaders = Self {
            registry: LoaderRegistry::new(),
            #[cfg(feature = "cast")]
            cast: None,
        };
        for name in &config.settings.loader_order {
            match name.as_str() {
                LOADER_GOOGLE_CAST => loaders.add_cast(config, ctx),
                LOADER_HLS => loaders.add_hls(ctx),
                LOADER_VIDEO => loaders
                    .registry
                    .register(Arc::new(VideoLoader::new(ctx.clone()))),
                LOADER_AUDIO => loaders.registry.register(Arc::new(AudioLoader::new())),
                other => warn!(loader = other, "unknown loader skipped"),
            }
        }
        loaders
    }

    #[cfg(feature = "hls")]
    fn add_hls(&mut self, ctx: &ProviderContext) {
        self.registry
            .register(Arc::new(provider_hls::HlsLoader::new(ctx.clone())));
    }

    #[cfg(not(feature = "hls"))]
    fn add_hls(&mut self, _ctx: &ProviderContext) {
        debug!("hls provider not compiled in");
    }

    #[cfg(feature = "cast")]
    fn add_cast(&mut self, config: &RuntimeConfig, ctx: &ProviderContext) {
        if !config.settings.features.remote_playback {
            debug!("remote playback disabled");
            return;
        }
        let Some(cast) = config.cast_context.clone() else {
            warn!("remote playback enabled without a cast context");
            return;
        };
        let coordinator = CastCoordinator::new(cast, Arc::clone(&ctx.delegate));
        self.registry
            .register(Arc::new(provider_cast::CastLoader::new(Arc::clone(&coordinator))));
        self.cast = Some(coordinator);
    }

    #[cfg(not(feature = "cast"))]
    fn add_cast(&mut self, config: &RuntimeConfig, _ctx: &ProviderContext) {
        if config.settings.features.remote_playback {
            warn!("remote playback enabled but the cast provider is not compiled in");
        } else {
            debug!("remote playback disabled");
        }
    }
}
