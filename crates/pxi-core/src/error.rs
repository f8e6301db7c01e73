use thiserror::Error;

#[derive(Error, Debug)]
pub enum PxiError {
    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("Provider rejected request (HTTP {status}): {body}")]
    ProviderRejected { status: u16, body: String },

    #[error("Invalid transform: {0}")]
    TransformInvalid(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
