//! The adapter contract every backend conforms to.

use crate::audio_graph::AudioGainAdapter;
use crate::capabilities::{FullscreenAdapter, PictureInPictureAdapter, RemotePlaybackAdapter};
use crate::disposal::DisposalBin;
use crate::error::Result;
use crate::source::Source;
use async_trait::async_trait;
use bridge_traits::Preload;

/// Uniform control and state surface of one source binding.
///
/// Property writes are fire-and-forget; the backend's confirmation arrives
/// later as a canonical event. Expected failures are reported as canonical
/// `error` events in addition to the returned `Result`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Discriminant: `video`, `audio`, `hls`, `google-cast`.
    fn kind(&self) -> &'static str;

    /// Cleanup scope tied to this adapter's lifetime; flushed on destroy.
    fn scope(&self) -> &DisposalBin;

    /// The last source passed to a successful `load_source`.
    fn current_src(&self) -> Option<Source>;

    /// Attach event pipelines. Idempotent; announces `provider-setup` once.
    async fn setup(&self) -> Result<()>;

    /// Release every backend resource. No events are emitted afterwards.
    async fn destroy(&self);

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    fn set_muted(&self, muted: bool);

    fn set_current_time(&self, time: f64);

    fn set_volume(&self, volume: f64);

    fn set_plays_inline(&self, _inline: bool) {}

    fn set_playback_rate(&self, _rate: f64) {}

    /// Bind a new source, tearing down the previous binding. Loading the
    /// current source again is a no-op.
    async fn load_source(&self, source: &Source, preload: Preload) -> Result<()>;

    fn fullscreen(&self) -> Option<&FullscreenAdapter> {
        None
    }

    fn picture_in_picture(&self) -> Option<&PictureInPictureAdapter> {
        None
    }

    fn audio_gain(&self) -> Option<&AudioGainAdapter> {
        None
    }

    fn remote_playback(&self) -> Option<&RemotePlaybackAdapter> {
        None
    }
}
