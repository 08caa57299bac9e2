//! # Provider Runtime
//!
//! Owns the loader registry and the single active adapter of one playback
//! surface.
//!
//! ## Load flow
//!
//! 1. Record the source and bump the load generation.
//! 2. Select the first loader that accepts the source.
//! 3. If the loader changed, destroy the old adapter before building,
//!    setting up and announcing the new one.
//! 4. Bind the source and apply a pending [`ResumePoint`].
//!
//! Every await is followed by a generation check. A continuation whose
//! source was superseded stops without side effects and reports
//! [`ProviderError::RaceLost`], which is never surfaced as a canonical error.

use crate::adapter::ProviderAdapter;
use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::loader::{LoaderRegistry, ProviderLoader};
use crate::source::{Source, SourceKind};
use async_trait::async_trait;
use bridge_traits::MediaElement;
use core_runtime::events::{MediaEvent, MediaEventKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Local playback position carried across a provider hand-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumePoint {
    pub time: f64,
    pub paused: bool,
}

/// What the remote-playback coordinator needs from the runtime, without
/// owning it.
#[async_trait]
pub trait PlaybackHandoff: Send + Sync {
    fn current_source(&self) -> Option<Source>;

    /// Applied to the next adapter that binds the current source.
    fn set_resume_point(&self, point: ResumePoint);

    /// Re-run selection for the current source. Used when the set of
    /// accepting loaders changes (a cast session connects or ends).
    async fn reselect(&self) -> Result<()>;
}

#[derive(Default)]
struct RuntimeState {
    surface: Option<Arc<dyn MediaElement>>,
    source: Option<Source>,
    loader: Option<Arc<dyn ProviderLoader>>,
    adapter: Option<Arc<dyn ProviderAdapter>>,
    resume: Option<ResumePoint>,
}

pub struct ProviderRuntime {
    ctx: ProviderContext,
    registry: LoaderRegistry,
    state: Mutex<RuntimeState>,
    generation: AtomicU64,
}

impl ProviderRuntime {
    pub fn new(ctx: ProviderContext, registry: LoaderRegistry) -> Self {
        info!(loaders = ?registry.names(), "provider runtime created");
        Self {
            ctx,
            registry,
            state: Mutex::new(RuntimeState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    pub fn adapter(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.state.lock().adapter.clone()
    }

    pub fn loader(&self) -> Option<Arc<dyn ProviderLoader>> {
        self.state.lock().loader.clone()
    }

    pub fn surface(&self) -> Option<Arc<dyn MediaElement>> {
        self.state.lock().surface.clone()
    }

    /// Bind a playback surface to every loader.
    pub fn mount(&self, surface: Arc<dyn MediaElement>) {
        self.registry.set_target(Some(Arc::clone(&surface)));
        self.state.lock().surface = Some(surface);
        debug!("playback surface mounted");
    }

    /// Release the surface along with the adapter attached to it.
    pub async fn unmount(&self) {
        self.registry.set_target(None);
        let adapter = {
            let mut state = self.state.lock();
            state.surface = None;
            state.loader = None;
            state.adapter.take()
        };
        if let Some(adapter) = adapter {
            adapter.destroy().await;
            self.publish(MediaEventKind::ProviderChange { provider: None });
        }
    }

    fn publish(&self, kind: MediaEventKind) {
        self.ctx.delegate.notify(None, &MediaEvent::new(kind));
    }

    fn publish_error(&self, error: &ProviderError) {
        if error.is_race_lost() {
            debug!(error = %error, "dropping superseded continuation");
            return;
        }
        self.publish(MediaEventKind::Error(error.to_detail()));
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn check_current(&self, generation: u64) -> Result<()> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(ProviderError::RaceLost)
        }
    }

    /// Select a provider for `source` and bind it.
    pub async fn load(&self, source: Source) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let changed = {
            let mut state = self.state.lock();
            let changed = state.source.as_ref() != Some(&source);
            if changed {
                state.source = Some(source.clone());
                // Resume points belong to the source they were captured for.
                state.resume = None;
            }
            changed
        };
        if changed {
            self.publish(MediaEventKind::SourceChange {
                src: Some(source_label(&source)),
            });
        }
        self.bind(generation, source).await
    }

    async fn bind(&self, generation: u64, source: Source) -> Result<()> {
        let Some(loader) = self.registry.select(&source) else {
            warn!(source = %source, "no supported provider");
            self.drop_adapter().await;
            let err = ProviderError::NoSupportedProvider(source.to_string());
            self.publish_error(&err);
            return Err(err);
        };

        let adapter = match self.adapter_for(&loader) {
            Some(adapter) => adapter,
            None => self.switch_adapter(generation, &loader).await?,
        };

        let preload = self.ctx.settings.preload;
        adapter.load_source(&source, preload).await?;
        self.check_current(generation)?;

        let resume = self.state.lock().resume.take();
        if let Some(point) = resume {
            debug!(time = point.time, paused = point.paused, "applying resume point");
            adapter.set_current_time(point.time);
            if !point.paused {
                // Rejections are already reported by the adapter.
                let _ = adapter.play().await;
            }
        }
        Ok(())
    }

    /// The active adapter if it came from `loader`.
    fn adapter_for(&self, loader: &Arc<dyn ProviderLoader>) -> Option<Arc<dyn ProviderAdapter>> {
        let state = self.state.lock();
        match (&state.loader, &state.adapter) {
            (Some(current), Some(adapter)) if current.name() == loader.name() => {
                Some(Arc::clone(adapter))
            }
            _ => None,
        }
    }

    async fn drop_adapter(&self) {
        let adapter = {
            let mut state = self.state.lock();
            state.loader = None;
            state.adapter.take()
        };
        if let Some(adapter) = adapter {
            adapter.destroy().await;
            self.publish(MediaEventKind::ProviderChange { provider: None });
        }
    }

    async fn switch_adapter(
        &self,
        generation: u64,
        loader: &Arc<dyn ProviderLoader>,
    ) -> Result<Arc<dyn ProviderAdapter>> {
        // Teardown before attach: one adapter per surface.
        self.drop_adapter().await;
        self.check_current(generation)?;

        info!(loader = loader.name(), "loading provider");
        loader.preconnect(&self.ctx);
        let adapter = match loader.load(&self.ctx).await {
            Ok(adapter) => adapter,
            Err(err) => {
                self.publish_error(&err);
                return Err(err);
            }
        };
        if !self.is_current(generation) {
            adapter.destroy().await;
            return Err(ProviderError::RaceLost);
        }

        if let Err(err) = adapter.setup().await {
            adapter.destroy().await;
            return Err(err);
        }
        if !self.is_current(generation) {
            adapter.destroy().await;
            return Err(ProviderError::RaceLost);
        }

        {
            let mut state = self.state.lock();
            state.loader = Some(Arc::clone(loader));
            state.adapter = Some(Arc::clone(&adapter));
        }
        self.publish(MediaEventKind::ProviderChange {
            provider: Some(adapter.kind().to_string()),
        });
        Ok(adapter)
    }

    pub async fn play(&self) -> Result<()> {
        let adapter = self.adapter().ok_or(ProviderError::NoActiveProvider)?;
        adapter.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        let adapter = self.adapter().ok_or(ProviderError::NoActiveProvider)?;
        adapter.pause().await
    }

    /// Tear down the active adapter and forget the source.
    pub async fn destroy(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        {
            let mut state = self.state.lock();
            state.source = None;
            state.resume = None;
        }
        self.drop_adapter().await;
        debug!("provider runtime destroyed");
    }
}

#[async_trait]
impl PlaybackHandoff for ProviderRuntime {
    fn current_source(&self) -> Option<Source> {
        self.state.lock().source.clone()
    }

    fn set_resume_point(&self, point: ResumePoint) {
        self.state.lock().resume = Some(point);
    }

    async fn reselect(&self) -> Result<()> {
        let Some(source) = self.current_source() else {
            return Ok(());
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(source = %source, "reselecting provider");
        self.bind(generation, source).await
    }
}

impl std::fmt::Debug for ProviderRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProviderRuntime")
            .field("registry", &self.registry)
            .field("source", &state.source)
            .field("provider", &state.adapter.as_ref().map(|a| a.kind()))
            .finish()
    }
}

fn source_label(source: &Source) -> String {
    match source.kind() {
        SourceKind::Url(url) => url.clone(),
        SourceKind::Stream(handle) => format!("stream:{}", handle.label()),
    }
}
