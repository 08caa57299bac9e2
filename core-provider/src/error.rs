//! # Provider Error Types
//!
//! Errors raised while selecting, loading or driving a provider. Expected
//! failures are also reported to consumers as canonical `error` events; the
//! `Result` exists so callers can branch on them.

use bridge_traits::BridgeError;
use core_runtime::events::{MediaErrorCode, MediaErrorDetail};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    // ========================================================================
    // Selection Errors
    // ========================================================================
    /// No registered loader accepts the source.
    #[error("No supported provider for source: {0}")]
    NoSupportedProvider(String),

    /// The loader needs a mounted playback surface.
    #[error("Loader '{0}' has no playback surface")]
    NoTarget(&'static str),

    #[error("No active provider")]
    NoActiveProvider,

    // ========================================================================
    // Library Errors
    // ========================================================================
    /// Fetching or evaluating a backend library failed.
    #[error("Failed to load library {library}: {message}")]
    LibraryLoad { library: String, message: String },

    /// The library resolved to nothing usable.
    #[error("Library {library} did not provide a usable export")]
    LibraryMissing { library: String },

    /// The library loaded but cannot run in this environment.
    #[error("Library {library} is not supported in this environment")]
    Unsupported { library: String },

    // ========================================================================
    // Playback Errors
    // ========================================================================
    #[error("Source not supported by this provider: {0}")]
    UnsupportedSource(String),

    /// A backend engine reported a failure.
    #[error("{message}")]
    Engine {
        message: String,
        code: Option<MediaErrorCode>,
    },

    /// A newer request superseded this one while it was awaiting.
    #[error("Superseded by a newer request")]
    RaceLost,

    #[error("Provider destroyed")]
    Destroyed,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Canonical error class for this failure.
    pub fn media_error_code(&self) -> Option<MediaErrorCode> {
        match self {
            ProviderError::NoSupportedProvider(_)
            | ProviderError::LibraryLoad { .. }
            | ProviderError::LibraryMissing { .. }
            | ProviderError::Unsupported { .. }
            | ProviderError::UnsupportedSource(_) => Some(MediaErrorCode::InvalidResource),
            ProviderError::Engine { code, .. } => *code,
            ProviderError::Bridge(BridgeError::ScriptLoad { .. }) => {
                Some(MediaErrorCode::InvalidResource)
            }
            ProviderError::Bridge(BridgeError::NotAvailable(_)) => {
                Some(MediaErrorCode::InvalidResource)
            }
            _ => None,
        }
    }

    /// Continuations that lose the source race are dropped, not reported.
    pub fn is_race_lost(&self) -> bool {
        matches!(self, ProviderError::RaceLost | ProviderError::Destroyed)
    }

    pub fn to_detail(&self) -> MediaErrorDetail {
        MediaErrorDetail::new(self.to_string(), self.media_error_code())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
