//! Optional capability sub-adapters of the native adapter.
//!
//! `supported` is probed lazily on first read and cached afterwards; these
//! element capabilities do not change during a binding.

use crate::delegate::ProviderNotifier;
use crate::error::{ProviderError, Result};
use bridge_traits::MediaElement;
use core_runtime::events::{
    MediaEventKind, RemotePlaybackDetail, RemotePlaybackKind, RemotePlaybackState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

fn unsupported(capability: &str) -> ProviderError {
    ProviderError::Unsupported {
        library: capability.to_string(),
    }
}

pub struct FullscreenAdapter {
    element: Arc<dyn MediaElement>,
    notifier: ProviderNotifier,
    supported: OnceLock<bool>,
    active: AtomicBool,
}

impl FullscreenAdapter {
    pub fn new(element: Arc<dyn MediaElement>, notifier: ProviderNotifier) -> Self {
        Self {
            element,
            notifier,
            supported: OnceLock::new(),
            active: AtomicBool::new(false),
        }
    }

    pub fn supported(&self) -> bool {
        *self
            .supported
            .get_or_init(|| self.element.supports_fullscreen())
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn enter(&self) -> Result<()> {
        if !self.supported() {
            return Err(unsupported("fullscreen"));
        }
        self.element.request_fullscreen().await?;
        self.set_active(true);
        Ok(())
    }

    pub async fn exit(&self) -> Result<()> {
        if !self.supported() {
            return Err(unsupported("fullscreen"));
        }
        self.element.exit_fullscreen().await?;
        self.set_active(false);
        Ok(())
    }

    fn set_active(&self, active: bool) {
        if self.active.swap(active, Ordering::AcqRel) != active {
            self.notifier
                .notify(MediaEventKind::FullscreenChange { active }, None);
        }
    }
}

pub struct PictureInPictureAdapter {
    element: Arc<dyn MediaElement>,
    notifier: ProviderNotifier,
    supported: OnceLock<bool>,
    active: AtomicBool,
}

impl PictureInPictureAdapter {
    pub fn new(element: Arc<dyn MediaElement>, notifier: ProviderNotifier) -> Self {
        Self {
            element,
            notifier,
            supported: OnceLock::new(),
            active: AtomicBool::new(false),
        }
    }

    pub fn supported(&self) -> bool {
        *self
            .supported
            .get_or_init(|| self.element.supports_picture_in_picture())
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub async fn enter(&self) -> Result<()> {
        if !self.supported() {
            return Err(unsupported("picture-in-picture"));
        }
        self.element.request_picture_in_picture().await?;
        self.set_active(true);
        Ok(())
    }

    pub async fn exit(&self) -> Result<()> {
        if !self.supported() {
            return Err(unsupported("picture-in-picture"));
        }
        self.element.exit_picture_in_picture().await?;
        self.set_active(false);
        Ok(())
    }

    fn set_active(&self, active: bool) {
        if self.active.swap(active, Ordering::AcqRel) != active {
            self.notifier
                .notify(MediaEventKind::PictureInPictureChange { active }, None);
        }
    }
}

/// Element-level remote route picker (AirPlay-style).
pub struct RemotePlaybackAdapter {
    element: Arc<dyn MediaElement>,
    notifier: ProviderNotifier,
    supported: OnceLock<bool>,
}

impl RemotePlaybackAdapter {
    pub fn new(element: Arc<dyn MediaElement>, notifier: ProviderNotifier) -> Self {
        Self {
            element,
            notifier,
            supported: OnceLock::new(),
        }
    }

    pub fn supported(&self) -> bool {
        *self
            .supported
            .get_or_init(|| self.element.supports_remote_playback())
    }

    /// Show the host's route picker. The connected state arrives later
    /// through native events.
    pub async fn prompt(&self) -> Result<()> {
        if !self.supported() {
            return Err(unsupported("remote-playback"));
        }
        self.notifier.notify(
            MediaEventKind::RemotePlaybackChange(RemotePlaybackDetail {
                kind: RemotePlaybackKind::AirPlay,
                state: RemotePlaybackState::Connecting,
                device: None,
            }),
            None,
        );
        if let Err(err) = self.element.prompt_remote_playback().await {
            self.notifier.notify(
                MediaEventKind::RemotePlaybackChange(RemotePlaybackDetail {
                    kind: RemotePlaybackKind::AirPlay,
                    state: RemotePlaybackState::Disconnected,
                    device: None,
                }),
                None,
            );
            return Err(err.into());
        }
        Ok(())
    }
}
