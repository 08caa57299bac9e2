use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The host refused a playback request (autoplay policy, user gesture
    /// missing, or the request was superseded by a later one).
    #[error("Request rejected by host: {0}")]
    Rejected(String),

    /// A script or module could not be fetched or evaluated.
    #[error("Script load failed for {url}: {message}")]
    ScriptLoad { url: String, message: String },
}

impl BridgeError {
    /// Returns `true` if the host rejected the request rather than failing it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BridgeError::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
