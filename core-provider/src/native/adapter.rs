use crate::adapter::ProviderAdapter;
use crate::audio_graph::AudioGainAdapter;
use crate::capabilities::{FullscreenAdapter, PictureInPictureAdapter, RemotePlaybackAdapter};
use crate::context::ProviderContext;
use crate::delegate::ProviderNotifier;
use crate::disposal::DisposalBin;
use crate::error::{ProviderError, Result};
use crate::source::Source;
use async_trait::async_trait;
use bridge_traits::{MediaElement, Preload};
use core_runtime::events::{MediaErrorDetail, MediaEventKind};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::engine::{EngineBinding, EngineStrategy};
use super::pipeline::NativePipeline;

#[derive(Debug, Default)]
struct AdapterState {
    setup: bool,
    destroyed: bool,
    current_src: Option<Source>,
}

/// Adapter core shared by every element-backed provider.
pub struct NativeAdapter {
    binding: EngineBinding,
    strategy: Arc<dyn EngineStrategy>,
    pipeline: NativePipeline,
    scope: DisposalBin,
    state: Mutex<AdapterState>,
    fullscreen: FullscreenAdapter,
    picture_in_picture: Option<PictureInPictureAdapter>,
    audio_gain: AudioGainAdapter,
    remote_playback: RemotePlaybackAdapter,
}

impl NativeAdapter {
    pub fn new(
        context: ProviderContext,
        element: Arc<dyn MediaElement>,
        strategy: Arc<dyn EngineStrategy>,
    ) -> Arc<Self> {
        let notifier = ProviderNotifier::new(Arc::clone(&context.delegate), strategy.kind());
        let pipeline = NativePipeline::new(
            Arc::clone(&element),
            notifier.clone(),
            Arc::clone(&context.frame_scheduler),
            !strategy.reports_stream_type(),
        );
        let picture_in_picture = context
            .settings
            .features
            .picture_in_picture
            .then(|| PictureInPictureAdapter::new(Arc::clone(&element), notifier.clone()));

        Arc::new(Self {
            fullscreen: FullscreenAdapter::new(Arc::clone(&element), notifier.clone()),
            picture_in_picture,
            audio_gain: AudioGainAdapter::new(context.audio_graph.clone(), Arc::clone(&element)),
            remote_playback: RemotePlaybackAdapter::new(Arc::clone(&element), notifier.clone()),
            binding: EngineBinding {
                element,
                notifier,
                context,
            },
            strategy,
            pipeline,
            scope: DisposalBin::new(),
            state: Mutex::new(AdapterState::default()),
        })
    }

    pub fn element(&self) -> &Arc<dyn MediaElement> {
        &self.binding.element
    }

    pub fn pipeline(&self) -> &NativePipeline {
        &self.pipeline
    }

    pub fn binding(&self) -> &EngineBinding {
        &self.binding
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(ProviderError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn report_rejection(&self, action: &str, error: &ProviderError) {
        debug!(provider = self.kind(), action, error = %error, "playback request rejected");
        self.binding.notifier.notify(
            MediaEventKind::Error(MediaErrorDetail::new(
                error.to_string(),
                error.media_error_code(),
            )),
            None,
        );
    }
}

#[async_trait]
impl ProviderAdapter for NativeAdapter {
    fn kind(&self) -> &'static str {
        self.strategy.kind()
    }

    fn scope(&self) -> &DisposalBin {
        &self.scope
    }

    fn current_src(&self) -> Option<Source> {
        self.state.lock().current_src.clone()
    }

    async fn setup(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(ProviderError::Destroyed);
            }
            if state.setup {
                return Ok(());
            }
            state.setup = true;
        }

        self.pipeline.attach();
        let pipeline = self.pipeline.clone();
        self.scope.add(move || pipeline.detach_all());

        if let Err(err) = self.strategy.setup(&self.binding).await {
            self.state.lock().setup = false;
            return Err(err);
        }

        info!(provider = self.kind(), "provider setup");
        self.binding.notifier.notify(
            MediaEventKind::ProviderSetup {
                provider: self.kind().to_string(),
            },
            None,
        );
        Ok(())
    }

    async fn destroy(&self) {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.current_src = None;
        }

        // Revoke first so teardown side effects never publish.
        self.binding.notifier.revoke();
        self.pipeline.detach_all();
        self.audio_gain.remove_gain();
        self.strategy.destroy(&self.binding).await;
        self.scope.empty();
        debug!(provider = self.kind(), "provider destroyed");
    }

    async fn play(&self) -> Result<()> {
        self.ensure_live()?;
        self.binding.element.play().await.map_err(|err| {
            let err = ProviderError::from(err);
            self.report_rejection("play", &err);
            err
        })
    }

    async fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        self.binding.element.pause().await.map_err(|err| {
            let err = ProviderError::from(err);
            self.report_rejection("pause", &err);
            err
        })
    }

    fn set_muted(&self, muted: bool) {
        self.binding.element.set_muted(muted);
    }

    fn set_current_time(&self, time: f64) {
        self.binding.element.set_current_time(time.max(0.0));
    }

    fn set_volume(&self, volume: f64) {
        self.binding.element.set_volume(volume.clamp(0.0, 1.0));
    }

    fn set_plays_inline(&self, inline: bool) {
        self.binding.element.set_plays_inline(inline);
    }

    fn set_playback_rate(&self, rate: f64) {
        self.binding.element.set_playback_rate(rate);
    }

    #[instrument(skip(self, source), fields(provider = self.kind(), source = %source))]
    async fn load_source(&self, source: &Source, preload: Preload) -> Result<()> {
        let previous = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(ProviderError::Destroyed);
            }
            if state.current_src.as_ref() == Some(source) {
                debug!("source already bound");
                return Ok(());
            }
            state.current_src.replace(source.clone())
        };

        if previous.is_some() {
            self.pipeline.reset();
            self.strategy.teardown(&self.binding);
        }

        if let Err(err) = self
            .strategy
            .load_source(&self.binding, source, preload)
            .await
        {
            let mut state = self.state.lock();
            if state.current_src.as_ref() == Some(source) {
                state.current_src = None;
            }
            return Err(err);
        }
        Ok(())
    }

    fn fullscreen(&self) -> Option<&FullscreenAdapter> {
        Some(&self.fullscreen)
    }

    fn picture_in_picture(&self) -> Option<&PictureInPictureAdapter> {
        self.picture_in_picture.as_ref()
    }

    fn audio_gain(&self) -> Option<&AudioGainAdapter> {
        Some(&self.audio_gain)
    }

    fn remote_playback(&self) -> Option<&RemotePlaybackAdapter> {
        Some(&self.remote_playback)
    }
}

impl std::fmt::Debug for NativeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeAdapter")
            .field("kind", &self.kind())
            .field("state", &*self.state.lock())
            .finish()
    }
}
