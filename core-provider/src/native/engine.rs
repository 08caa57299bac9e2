use crate::context::ProviderContext;
use crate::delegate::ProviderNotifier;
use crate::error::{ProviderError, Result};
use crate::source::{Source, SourceKind};
use async_trait::async_trait;
use bridge_traits::{MediaElement, Preload};
use core_runtime::events::{MediaEventKind, StreamType, Trigger};
use std::sync::Arc;

/// Everything a strategy may touch while bound to one adapter.
#[derive(Clone)]
pub struct EngineBinding {
    pub element: Arc<dyn MediaElement>,
    pub notifier: ProviderNotifier,
    pub context: ProviderContext,
}

impl EngineBinding {
    /// Point the element at `source` and start fetching.
    pub fn assign_source(&self, source: &Source, preload: Preload) {
        self.element.set_preload(preload);
        match source.kind() {
            SourceKind::Url(url) => {
                self.element.set_src_object(None);
                self.element.set_src(Some(url.as_str()));
            }
            SourceKind::Stream(handle) => {
                self.element.set_src(None);
                self.element.set_src_object(Some(handle));
            }
        }
        self.element.load();
    }

    /// Detach any resource and let the element drop its buffers.
    pub fn release_source(&self) {
        self.element.set_src_object(None);
        self.element.set_src(None);
        self.element.load();
    }

    pub fn set_stream_type(&self, stream_type: StreamType, trigger: Option<Trigger<'_>>) {
        self.notifier
            .notify(MediaEventKind::StreamTypeChange { stream_type }, trigger);
    }

    /// Report `error` as a canonical error event unless it lost a race.
    pub fn report(&self, error: &ProviderError, trigger: Option<Trigger<'_>>) {
        if error.is_race_lost() {
            return;
        }
        self.notifier
            .notify(MediaEventKind::Error(error.to_detail()), trigger);
    }
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBinding")
            .field("provider", &self.notifier.provider())
            .finish()
    }
}

/// Backend-specific half of a native adapter.
#[async_trait]
pub trait EngineStrategy: Send + Sync {
    /// Adapter discriminant reported for this backend.
    fn kind(&self) -> &'static str;

    /// Whether the strategy publishes its own stream type. When `false` the
    /// pipeline derives it from the element duration.
    fn reports_stream_type(&self) -> bool {
        false
    }

    /// One-time preparation, e.g. acquiring an engine library.
    async fn setup(&self, _binding: &EngineBinding) -> Result<()> {
        Ok(())
    }

    async fn load_source(
        &self,
        binding: &EngineBinding,
        source: &Source,
        preload: Preload,
    ) -> Result<()>;

    /// Release what the previous source held before a new one attaches.
    fn teardown(&self, _binding: &EngineBinding) {}

    async fn destroy(&self, binding: &EngineBinding) {
        binding.release_source();
    }
}

/// Plays sources by assigning them to the element directly.
#[derive(Debug, Clone)]
pub struct ElementStrategy {
    kind: &'static str,
}

impl ElementStrategy {
    pub fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl EngineStrategy for ElementStrategy {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn load_source(
        &self,
        binding: &EngineBinding,
        source: &Source,
        preload: Preload,
    ) -> Result<()> {
        binding.assign_source(source, preload);
        Ok(())
    }
}
