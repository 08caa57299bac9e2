use crate::engine::HlsEngineFactory;
use crate::strategy::HlsEngineStrategy;
use async_trait::async_trait;
use core_provider::library::LibraryRef;
use core_provider::source::is_hls_src;
use core_provider::{
    MediaType, NativeAdapter, ProviderAdapter, ProviderContext, ProviderError, ProviderLoader,
    Result, Source, TargetSlot,
};
use core_runtime::config::LOADER_HLS;
use std::sync::Arc;

/// Plays HLS playlists through a segment engine when the platform exposes
/// media source extensions.
pub struct HlsLoader {
    target: TargetSlot,
    ctx: ProviderContext,
    library: LibraryRef<dyn HlsEngineFactory>,
}

impl HlsLoader {
    /// Engine fetched from the configured script URL and global symbol.
    pub fn new(ctx: ProviderContext) -> Self {
        let library = LibraryRef::url(
            ctx.settings.hls.url.clone(),
            ctx.settings.hls.global_symbol.clone(),
        );
        Self::with_library(ctx, library)
    }

    pub fn with_library(ctx: ProviderContext, library: LibraryRef<dyn HlsEngineFactory>) -> Self {
        Self {
            target: TargetSlot::new(),
            ctx,
            library,
        }
    }

    pub fn library(&self) -> &LibraryRef<dyn HlsEngineFactory> {
        &self.library
    }
}

#[async_trait]
impl ProviderLoader for HlsLoader {
    fn name(&self) -> &'static str {
        LOADER_HLS
    }

    fn target(&self) -> &TargetSlot {
        &self.target
    }

    fn can_play(&self, source: &Source) -> bool {
        !source.is_stream() && is_hls_src(source) && self.ctx.probes.supports_media_source()
    }

    fn media_type(&self, source: Option<&Source>) -> MediaType {
        match source {
            Some(source) if source.mime_type().eq_ignore_ascii_case("audio/mpegurl") => {
                MediaType::Audio
            }
            _ => MediaType::Video,
        }
    }

    fn preconnect(&self, ctx: &ProviderContext) {
        ctx.libraries.preconnect(&self.library);
    }

    async fn load(&self, ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
        let element = self.target.get().ok_or(ProviderError::NoTarget(LOADER_HLS))?;
        let strategy = HlsEngineStrategy::new(self.library.clone());
        let adapter = NativeAdapter::new(ctx.clone(), element, Arc::new(strategy));
        Ok(adapter)
    }
}

impl std::fmt::Debug for HlsLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlsLoader")
            .field("library", &self.library)
            .field("target", &self.target)
            .finish()
    }
}
