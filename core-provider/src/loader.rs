//! # Provider Loaders
//!
//! A loader is a stateless selector plus factory: it answers whether it can
//! serve a [`Source`] and, once chosen, builds the adapter bound to its
//! playback surface.
//!
//! The [`LoaderRegistry`] keeps loaders in configured priority order and
//! selects the first one whose predicate accepts a source. There is no
//! scoring; declaration order is the only tie-break.

use crate::adapter::ProviderAdapter;
use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::native::{ElementStrategy, NativeAdapter};
use crate::source::{is_audio_src, is_hls_src, is_video_src, MediaType, Source};
use async_trait::async_trait;
use bridge_traits::MediaElement;
use core_runtime::config::{LOADER_AUDIO, LOADER_VIDEO};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// The playback surface a loader will attach its adapter to.
///
/// Empty until a surface mounts. Predicates must still answer while it is
/// empty (server rendering); `load` is where a missing target fails.
#[derive(Default)]
pub struct TargetSlot {
    element: RwLock<Option<Arc<dyn MediaElement>>>,
}

impl TargetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<dyn MediaElement>> {
        self.element.read().clone()
    }

    pub fn set(&self, element: Option<Arc<dyn MediaElement>>) {
        *self.element.write() = element;
    }

    pub fn is_bound(&self) -> bool {
        self.element.read().is_some()
    }
}

impl std::fmt::Debug for TargetSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSlot")
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[async_trait]
pub trait ProviderLoader: Send + Sync {
    fn name(&self) -> &'static str;

    fn target(&self) -> &TargetSlot;

    /// Pure and infallible; never touches the network.
    fn can_play(&self, source: &Source) -> bool;

    fn media_type(&self, source: Option<&Source>) -> MediaType;

    /// Warm up connections ahead of `load`.
    fn preconnect(&self, _ctx: &ProviderContext) {}

    async fn load(&self, ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>>;

    /// Resolve a poster image for the source. `None` when the backend has no
    /// poster of its own.
    async fn load_poster(
        &self,
        _source: &Source,
        _ctx: &ProviderContext,
        _cancel: CancellationToken,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// First loader in `loaders` whose predicate accepts `source`.
pub fn select<'a>(
    source: &Source,
    loaders: &'a [Arc<dyn ProviderLoader>],
) -> Option<&'a Arc<dyn ProviderLoader>> {
    loaders.iter().find(|loader| loader.can_play(source))
}

/// Ordered set of loaders.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn ProviderLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loader at the lowest priority.
    pub fn register(&mut self, loader: Arc<dyn ProviderLoader>) {
        debug!(loader = loader.name(), position = self.loaders.len(), "registered loader");
        self.loaders.push(loader);
    }

    pub fn with(mut self, loader: Arc<dyn ProviderLoader>) -> Self {
        self.register(loader);
        self
    }

    pub fn loaders(&self) -> &[Arc<dyn ProviderLoader>] {
        &self.loaders
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderLoader>> {
        self.loaders
            .iter()
            .find(|loader| loader.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|loader| loader.name()).collect()
    }

    #[instrument(skip(self, source), fields(source = %source))]
    pub fn select(&self, source: &Source) -> Option<Arc<dyn ProviderLoader>> {
        let selected = select(source, &self.loaders).cloned();
        match &selected {
            Some(loader) => debug!(loader = loader.name(), "selected loader"),
            None => debug!("no loader accepts source"),
        }
        selected
    }

    /// Bind every loader to the mounted playback surface.
    pub fn set_target(&self, element: Option<Arc<dyn MediaElement>>) {
        for loader in &self.loaders {
            loader.target().set(element.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("loaders", &self.names())
            .finish()
    }
}

// ============================================================================
// Native Loaders
// ============================================================================

/// Plays video files and live streams on the element itself. Also claims
/// HLS sources when the element can play them without an engine.
pub struct VideoLoader {
    target: TargetSlot,
    ctx: ProviderContext,
}

impl VideoLoader {
    pub fn new(ctx: ProviderContext) -> Self {
        Self {
            target: TargetSlot::new(),
            ctx,
        }
    }
}

#[async_trait]
impl ProviderLoader for VideoLoader {
    fn name(&self) -> &'static str {
        LOADER_VIDEO
    }

    fn target(&self) -> &TargetSlot {
        &self.target
    }

    fn can_play(&self, source: &Source) -> bool {
        if is_video_src(source) {
            return true;
        }
        match self.target.get() {
            Some(element) if is_hls_src(source) => {
                self.ctx.probes.supports_native_hls(element.as_ref())
            }
            _ => false,
        }
    }

    fn media_type(&self, _source: Option<&Source>) -> MediaType {
        MediaType::Video
    }

    async fn load(&self, ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
        let element = self.target.get().ok_or(ProviderError::NoTarget(LOADER_VIDEO))?;
        let adapter = NativeAdapter::new(
            ctx.clone(),
            element,
            Arc::new(ElementStrategy::new(LOADER_VIDEO)),
        );
        Ok(adapter)
    }
}

pub struct AudioLoader {
    target: TargetSlot,
}

impl AudioLoader {
    pub fn new() -> Self {
        Self {
            target: TargetSlot::new(),
        }
    }
}

impl Default for AudioLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderLoader for AudioLoader {
    fn name(&self) -> &'static str {
        LOADER_AUDIO
    }

    fn target(&self) -> &TargetSlot {
        &self.target
    }

    fn can_play(&self, source: &Source) -> bool {
        is_audio_src(source)
    }

    fn media_type(&self, _source: Option<&Source>) -> MediaType {
        MediaType::Audio
    }

    async fn load(&self, ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
        let element = self.target.get().ok_or(ProviderError::NoTarget(LOADER_AUDIO))?;
        let adapter = NativeAdapter::new(
            ctx.clone(),
            element,
            Arc::new(ElementStrategy::new(LOADER_AUDIO)),
        );
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ElementProps, MockMediaElement};
    use bridge_traits::IntervalFrameScheduler;
    use core_runtime::config::RuntimeConfig;

    fn context() -> ProviderContext {
        let config = RuntimeConfig::builder()
            .frame_scheduler(Arc::new(IntervalFrameScheduler::default()))
            .build()
            .unwrap();
        ProviderContext::from_config(&config)
    }

    struct FixedLoader {
        name: &'static str,
        accepts: bool,
        target: TargetSlot,
    }

    #[async_trait]
    impl ProviderLoader for FixedLoader {
        fn name(&self) -> &'static str {
            self.name
        }

        fn target(&self) -> &TargetSlot {
            &self.target
        }

        fn can_play(&self, _source: &Source) -> bool {
            self.accepts
        }

        fn media_type(&self, _source: Option<&Source>) -> MediaType {
            MediaType::Unknown
        }

        async fn load(&self, _ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
            Err(ProviderError::Internal("not used".into()))
        }
    }

    fn fixed(name: &'static str, accepts: bool) -> Arc<dyn ProviderLoader> {
        Arc::new(FixedLoader {
            name,
            accepts,
            target: TargetSlot::new(),
        })
    }

    #[test]
    fn select_returns_first_match_in_declaration_order() {
        let source = Source::url("a.mp4", "video/mp4");
        let loaders = vec![fixed("a", false), fixed("b", true), fixed("c", true)];
        assert_eq!(select(&source, &loaders).map(|l| l.name()), Some("b"));

        let none = vec![fixed("a", false)];
        assert!(select(&source, &none).is_none());
    }

    #[test]
    fn registry_binds_targets() {
        let registry = LoaderRegistry::new()
            .with(Arc::new(AudioLoader::new()))
            .with(Arc::new(VideoLoader::new(context())));
        assert_eq!(registry.names(), vec!["audio", "video"]);

        registry.set_target(Some(MockMediaElement::new()));
        assert!(registry.loaders().iter().all(|l| l.target().is_bound()));
        registry.set_target(None);
        assert!(registry.get("video").map(|l| !l.target().is_bound()).unwrap());
    }

    #[test]
    fn video_claims_hls_only_with_native_support() {
        let hls = Source::untyped("https://cdn/master.m3u8");

        let plain = VideoLoader::new(context());
        assert!(!plain.can_play(&hls));
        plain.target().set(Some(MockMediaElement::new()));
        assert!(!plain.can_play(&hls));

        let native = VideoLoader::new(context());
        native.target().set(Some(MockMediaElement::with_props(ElementProps {
            native_hls: true,
            ..Default::default()
        })));
        assert!(native.can_play(&hls));
    }

    #[tokio::test]
    async fn load_without_target_fails() {
        let loader = AudioLoader::new();
        let err = loader.load(&context()).await.err().unwrap();
        assert_eq!(err, ProviderError::NoTarget("audio"));
    }

    #[tokio::test]
    async fn default_poster_is_none() {
        let loader = AudioLoader::new();
        let poster = loader
            .load_poster(&Source::untyped("a.mp3"), &context(), CancellationToken::new())
            .await
            .unwrap();
        assert!(poster.is_none());
    }
}
