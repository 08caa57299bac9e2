use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] core_provider::ProviderError),

    #[cfg(feature = "cast")]
    #[error("Cast error: {0}")]
    Cast(#[from] provider_cast::CastError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
