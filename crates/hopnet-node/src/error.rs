//! Error types for the node glue crate.

/// Errors from host-side setup.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
