//! Error types for the cast provider

use bridge_traits::CastErrorCode;
use core_provider::ProviderError;
use thiserror::Error;

/// Human-readable message for a cast session error code.
pub fn cast_error_message(code: CastErrorCode) -> &'static str {
    match code {
        CastErrorCode::Cancel => "The operation was canceled by the user.",
        CastErrorCode::Timeout => "The operation timed out.",
        CastErrorCode::ApiNotInitialized => "The cast API is not initialized.",
        CastErrorCode::InvalidParameter => "The parameters to the operation were not valid.",
        CastErrorCode::ExtensionNotCompatible => {
            "The cast extension is not compatible with this environment."
        }
        CastErrorCode::ExtensionMissing => "The cast extension is not available.",
        CastErrorCode::ReceiverUnavailable => {
            "No receiver was compatible with the session request."
        }
        CastErrorCode::SessionError => "A session could not be created, or a session was invalid.",
        CastErrorCode::ChannelError => "A channel to the receiver is not available.",
        CastErrorCode::LoadMediaFailed => "Load media failed.",
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CastError {
    /// A session action returned an error code
    #[error("{message}")]
    Session {
        code: CastErrorCode,
        message: &'static str,
    },

    /// The cast framework is not usable here
    #[error("Cast framework is not available")]
    NotAvailable,

    /// No receiver session is connected
    #[error("No cast session is connected")]
    NoSession,

    /// Stream handles cannot be sent to a receiver
    #[error("Cast receivers cannot play stream handles")]
    StreamSource,
}

impl CastError {
    pub fn from_code(code: CastErrorCode) -> Self {
        CastError::Session {
            code,
            message: cast_error_message(code),
        }
    }

    pub fn code(&self) -> Option<CastErrorCode> {
        match self {
            CastError::Session { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for cast operations
pub type Result<T> = std::result::Result<T, CastError>;

impl From<CastError> for ProviderError {
    fn from(error: CastError) -> Self {
        match error {
            CastError::StreamSource => ProviderError::UnsupportedSource(error.to_string()),
            // Receiver failures have no local media error class.
            _ => ProviderError::Engine {
                message: error.to_string(),
                code: None,
            },
        }
    }
}
