//! Backend trait for key/value persistence.

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata attached to a stored key.
///
/// Metadata rides alongside the value so listings can show labels and apply
/// scope filtering without deserializing (or decrypting) the value itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Human-readable label for the entry (e.g. an OPML filename).
    #[serde(default)]
    pub name: String,
    /// Service namespace the entry belongs to.
    #[serde(default)]
    pub service: String,
    /// Caller identity that owns the entry.
    #[serde(default)]
    pub owner: String,
}

/// A key returned by [`StoreBackend::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedKey {
    /// The storage key.
    pub name: String,
    /// Metadata recorded at put time.
    pub metadata: KeyMetadata,
}

/// Options for a [`StoreBackend::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Metadata stored alongside the value.
    pub metadata: KeyMetadata,
    /// Whether an existing key may be replaced. When false, putting to an
    /// existing key fails with [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists).
    pub allow_overwrite: bool,
    /// Optional time-to-live. An expired entry reads as absent.
    pub expiration_ttl: Option<Duration>,
}

impl PutOptions {
    /// Options that allow replacing an existing key.
    #[must_use]
    pub fn overwrite(metadata: KeyMetadata) -> Self {
        Self {
            metadata,
            allow_overwrite: true,
            expiration_ttl: None,
        }
    }

    /// Options that refuse to replace an existing key.
    #[must_use]
    pub fn create_only(metadata: KeyMetadata) -> Self {
        Self {
            metadata,
            allow_overwrite: false,
            expiration_ttl: None,
        }
    }

    /// Sets a time-to-live for the entry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiration_ttl = Some(ttl);
        self
    }
}

/// A text-valued key/value backend.
///
/// Backends store opaque strings. They enforce no access control and apply
/// no encryption; both belong to [`EncryptedStore`](crate::EncryptedStore).
/// Implementations must be safe to share across request tasks.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Returns the value and metadata for `key`, or `None` if absent or expired.
    async fn get_with_metadata(&self, key: &str) -> StoreResult<Option<(String, KeyMetadata)>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists)
    /// if the key is present and `options.allow_overwrite` is false.
    async fn put(&self, key: &str, value: &str, options: PutOptions) -> StoreResult<()>;

    /// Lists keys starting with `prefix`, with their metadata.
    ///
    /// The listing may span every scope in the backend; callers that need
    /// scoped results must filter.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ListedKey>>;

    /// Removes `key`. Removing an absent key is a no-op.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
