//! Error types for the HLS provider

use crate::engine::HlsErrorKind;
use core_provider::ProviderError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HlsError {
    /// The engine library loaded but cannot run here
    #[error("HLS engine is not supported in this environment")]
    Unsupported,

    /// The factory failed to build an engine instance
    #[error("Failed to create HLS engine: {0}")]
    CreateFailed(String),

    /// Adapter used before `setup()` produced an engine
    #[error("HLS engine not initialised")]
    NotInitialised,

    /// Live stream handles cannot be fed to a segment engine
    #[error("HLS engine cannot play stream handles")]
    StreamSource,

    /// Fatal error reported by the engine
    #[error("HLS {}: {details}", .kind.as_str())]
    Fatal { kind: HlsErrorKind, details: String },
}

pub type Result<T> = std::result::Result<T, HlsError>;

impl From<HlsError> for ProviderError {
    fn from(error: HlsError) -> Self {
        match error {
            HlsError::Unsupported => ProviderError::Unsupported {
                library: "hls".to_string(),
            },
            HlsError::StreamSource => ProviderError::UnsupportedSource(error.to_string()),
            HlsError::Fatal { kind, .. } => ProviderError::Engine {
                message: error.to_string(),
                code: Some(kind.media_error_code()),
            },
            HlsError::CreateFailed(_) | HlsError::NotInitialised => ProviderError::Engine {
                message: error.to_string(),
                code: Some(core_runtime::events::MediaErrorCode::InvalidResource),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::MediaErrorCode;

    #[test]
    fn test_error_display() {
        let error = HlsError::Fatal {
            kind: HlsErrorKind::Media,
            details: "bufferAppendError".to_string(),
        };
        assert_eq!(error.to_string(), "HLS mediaError: bufferAppendError");
    }

    #[test]
    fn test_error_conversion() {
        let fatal: ProviderError = HlsError::Fatal {
            kind: HlsErrorKind::Network,
            details: "fragLoadError".to_string(),
        }
        .into();
        assert_eq!(fatal.media_error_code(), Some(MediaErrorCode::Network));

        let unsupported: ProviderError = HlsError::Unsupported.into();
        assert_eq!(
            unsupported.media_error_code(),
            Some(MediaErrorCode::InvalidResource)
        );
    }
}
