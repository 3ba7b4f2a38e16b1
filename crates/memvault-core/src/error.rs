//! Error taxonomy for memvault.
//!
//! Not-found and malformed-data conditions never surface here; they degrade
//! to empty results at the call site. What remains are failures a caller can
//! act on: a write that did not land, or a configuration that cannot work.

/// memvault errors.
#[derive(Debug, thiserror::Error)]
pub enum MemvaultError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for memvault operations.
pub type Result<T> = std::result::Result<T, MemvaultError>;
