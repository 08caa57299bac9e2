//! HLS engine strategy for the native adapter.
//!
//! Setup acquires the engine library once, checks that it can run, then
//! builds one engine and attaches it to the element. The element keeps
//! emitting its own native events; this strategy only adds what the engine
//! knows on top (stream type from level details, fatal engine errors).

use crate::engine::{HlsEngine, HlsEngineFactory, HlsEvent};
use crate::error::HlsError;
use async_trait::async_trait;
use bridge_traits::{ListenerId, Preload};
use core_provider::library::{LibraryLoadObserver, LibraryRef};
use core_provider::{EngineBinding, EngineStrategy, ProviderError, ProviderNotifier, Result, Source};
use core_runtime::config::LOADER_HLS;
use core_runtime::events::{MediaEventKind, StreamType, Trigger};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Publishes the library lifecycle as canonical events.
struct LibraryEvents {
    notifier: ProviderNotifier,
    library: String,
}

impl LibraryLoadObserver<dyn HlsEngineFactory> for LibraryEvents {
    fn on_load_start(&self) {
        self.notifier.notify(
            MediaEventKind::LibLoadStart {
                library: self.library.clone(),
            },
            None,
        );
    }

    fn on_loaded(&self, _library: &Arc<dyn HlsEngineFactory>) {
        self.notifier.notify(
            MediaEventKind::LibLoaded {
                library: self.library.clone(),
            },
            None,
        );
    }

    fn on_load_error(&self, error: &ProviderError) {
        self.notifier.notify(
            MediaEventKind::LibLoadError {
                library: self.library.clone(),
                error: error.to_detail(),
            },
            None,
        );
    }
}

#[derive(Default)]
struct EngineSlot {
    engine: Option<Arc<dyn HlsEngine>>,
    listener: Option<ListenerId>,
}

pub struct HlsEngineStrategy {
    library: LibraryRef<dyn HlsEngineFactory>,
    slot: Mutex<EngineSlot>,
    stream_type: Arc<Mutex<Option<StreamType>>>,
}

impl HlsEngineStrategy {
    pub fn new(library: LibraryRef<dyn HlsEngineFactory>) -> Self {
        Self {
            library,
            slot: Mutex::new(EngineSlot::default()),
            stream_type: Arc::new(Mutex::new(None)),
        }
    }

    pub fn engine(&self) -> Option<Arc<dyn HlsEngine>> {
        self.slot.lock().engine.clone()
    }

    fn fail(&self, binding: &EngineBinding, error: ProviderError) -> Result<()> {
        binding.report(&error, None);
        Err(error)
    }

    fn engine_listener(&self, binding: &EngineBinding) -> crate::engine::HlsListener {
        let binding = binding.clone();
        let stream_type = Arc::clone(&self.stream_type);
        Arc::new(move |event: &HlsEvent| {
            let native = event.to_native();
            let trigger = Some(Trigger::Native(&native));
            match event {
                HlsEvent::ManifestParsed { levels } => {
                    debug!(levels, "hls manifest parsed");
                }
                HlsEvent::LevelLoaded { live, .. } => {
                    let next = if *live {
                        StreamType::Live
                    } else {
                        StreamType::OnDemand
                    };
                    let changed = stream_type.lock().replace(next) != Some(next);
                    if changed {
                        binding.set_stream_type(next, trigger);
                    }
                }
                HlsEvent::Error {
                    fatal: true,
                    kind,
                    details,
                } => {
                    warn!(kind = kind.as_str(), details = %details, "fatal hls error");
                    let error: HlsError = HlsError::Fatal {
                        kind: *kind,
                        details: details.clone(),
                    };
                    binding.report(&error.into(), trigger);
                }
                HlsEvent::Error { kind, details, .. } => {
                    trace!(kind = kind.as_str(), details = %details, "recoverable hls error");
                }
            }
        })
    }
}

#[async_trait]
impl EngineStrategy for HlsEngineStrategy {
    fn kind(&self) -> &'static str {
        LOADER_HLS
    }

    fn reports_stream_type(&self) -> bool {
        true
    }

    async fn setup(&self, binding: &EngineBinding) -> Result<()> {
        let observer = LibraryEvents {
            notifier: binding.notifier.clone(),
            library: self.library.describe(),
        };
        let factory = match binding.context.libraries.load(&self.library, &observer).await {
            Ok(factory) => factory,
            Err(err) => return self.fail(binding, err),
        };

        if !factory.is_supported() {
            warn!("hls engine unsupported in this environment");
            binding.notifier.notify(
                MediaEventKind::Unsupported {
                    library: observer.library.clone(),
                },
                None,
            );
            return self.fail(binding, HlsError::Unsupported.into());
        }

        let engine = match factory.create() {
            Ok(engine) => engine,
            Err(err) => return self.fail(binding, err.into()),
        };
        engine.attach_media(Arc::clone(&binding.element));
        let listener = engine.add_listener(self.engine_listener(binding));

        let mut slot = self.slot.lock();
        slot.engine = Some(engine);
        slot.listener = Some(listener);
        info!("hls engine attached");
        Ok(())
    }

    async fn load_source(
        &self,
        binding: &EngineBinding,
        source: &Source,
        preload: Preload,
    ) -> Result<()> {
        let Some(url) = source.src() else {
            return self.fail(binding, HlsError::StreamSource.into());
        };
        let Some(engine) = self.engine() else {
            return self.fail(binding, HlsError::NotInitialised.into());
        };

        binding.element.set_preload(preload);
        engine.load_source(url);
        if preload != Preload::None {
            engine.start_load(-1.0);
        }
        debug!(source = %source, "hls source loaded");
        Ok(())
    }

    fn teardown(&self, _binding: &EngineBinding) {
        *self.stream_type.lock() = None;
        if let Some(engine) = self.engine() {
            engine.stop_load();
        }
    }

    async fn destroy(&self, binding: &EngineBinding) {
        let slot = std::mem::take(&mut *self.slot.lock());
        if let Some(engine) = slot.engine {
            if let Some(listener) = slot.listener {
                engine.remove_listener(listener);
            }
            engine.detach_media();
            engine.destroy();
        }
        binding.release_source();
    }
}

impl std::fmt::Debug for HlsEngineStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlsEngineStrategy")
            .field("library", &self.library)
            .field("attached", &self.engine().is_some())
            .finish()
    }
}
