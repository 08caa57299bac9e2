use crate::adapter::CastAdapter;
use crate::coordinator::CastCoordinator;
use async_trait::async_trait;
use core_provider::{
    MediaType, ProviderAdapter, ProviderContext, ProviderLoader, Result, Source, TargetSlot,
};
use core_runtime::config::LOADER_GOOGLE_CAST;
use std::sync::Arc;

/// Claims every URL source while a receiver session is connected. Placed
/// first in the loader order so casting takes over from local playback.
pub struct CastLoader {
    // Receivers render remotely; the slot only satisfies the loader contract.
    target: TargetSlot,
    coordinator: Arc<CastCoordinator>,
}

impl CastLoader {
    pub fn new(coordinator: Arc<CastCoordinator>) -> Self {
        Self {
            target: TargetSlot::new(),
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<CastCoordinator> {
        &self.coordinator
    }
}

#[async_trait]
impl ProviderLoader for CastLoader {
    fn name(&self) -> &'static str {
        LOADER_GOOGLE_CAST
    }

    fn target(&self) -> &TargetSlot {
        &self.target
    }

    fn can_play(&self, source: &Source) -> bool {
        !source.is_stream() && self.coordinator.is_connected()
    }

    fn media_type(&self, _source: Option<&Source>) -> MediaType {
        MediaType::Video
    }

    async fn load(&self, ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
        let adapter = CastAdapter::new(ctx.clone(), Arc::clone(&self.coordinator));
        Ok(adapter)
    }
}

impl std::fmt::Debug for CastLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastLoader")
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
