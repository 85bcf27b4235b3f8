/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("invalid DID key: {0}")]
    InvalidKey(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
