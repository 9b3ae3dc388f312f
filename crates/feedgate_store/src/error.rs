//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur in store operations.
///
/// Expected misses (unknown key, foreign owner, undecryptable blob) are not
/// errors; those surface as `None` from [`EncryptedStore`](crate::EncryptedStore)
/// methods. This enum covers genuine faults in the backend or the crypto
/// primitives.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry envelope could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cipher failed to seal a value.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A put without overwrite permission hit an existing key.
    #[error("key already exists: {key}")]
    AlreadyExists {
        /// The key that was already present.
        key: String,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
