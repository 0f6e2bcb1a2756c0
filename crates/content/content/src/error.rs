use thiserror::Error;

/// Errors from content-addressed store operations.
#[derive(Debug, Error)]
pub enum ContentStoreError {
    /// The store rejected or failed the content transfer itself.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store answered with a non-success status.
    #[error("store returned status {code}: {detail}")]
    Status { code: u16, detail: String },
}

impl ContentStoreError {
    /// Returns `true` if the error is transient and the operation may
    /// succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Transfer(_) | Self::Serialization(_) => false,
        }
    }
}
