//! In-memory backend for ephemeral storage.

use crate::backend::{KeyMetadata, ListedKey, PutOptions, StoreBackend};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone)]
struct Record {
    value: String,
    metadata: KeyMetadata,
    expires_at: Option<Instant>,
}

impl Record {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// An in-memory key/value backend.
///
/// The ephemeral fallback used when no store directory is configured, and
/// the default backend in tests. Contents are lost on process exit.
///
/// # Thread Safety
///
/// Safe to share across request tasks. No lock is held across an await
/// point; every operation completes under a single lock acquisition.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, Record>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|r| !r.is_expired()).count()
    }

    /// Returns true if the backend holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw stored value without any interpretation.
    ///
    /// Useful in tests asserting that values reach the backend encrypted.
    #[must_use]
    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).map(|r| r.value.clone())
    }
}

#[async_trait]
impl StoreBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|r| !r.is_expired())
            .map(|r| r.value.clone()))
    }

    async fn get_with_metadata(&self, key: &str) -> StoreResult<Option<(String, KeyMetadata)>> {
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|r| !r.is_expired())
            .map(|r| (r.value.clone(), r.metadata.clone())))
    }

    async fn put(&self, key: &str, value: &str, options: PutOptions) -> StoreResult<()> {
        let mut entries = self.entries.write();
        if !options.allow_overwrite {
            if let Some(existing) = entries.get(key) {
                if !existing.is_expired() {
                    return Err(StoreError::AlreadyExists {
                        key: key.to_string(),
                    });
                }
            }
        }

        let expires_at = options.expiration_ttl.map(|ttl| Instant::now() + ttl);
        entries.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                metadata: options.metadata,
                expires_at,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ListedKey>> {
        let entries = self.entries.read();
        let mut keys: Vec<ListedKey> = entries
            .iter()
            .filter(|(name, record)| name.starts_with(prefix) && !record.is_expired())
            .map(|(name, record)| ListedKey {
                name: name.clone(),
                metadata: record.metadata.clone(),
            })
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn meta(name: &str) -> KeyMetadata {
        KeyMetadata {
            name: name.to_string(),
            service: "TEST".to_string(),
            owner: "owner".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let backend = InMemoryBackend::new();
        backend
            .put("k1", "hello", PutOptions::overwrite(meta("one")))
            .await
            .unwrap();

        assert_eq!(backend.get("k1").await.unwrap(), Some("hello".to_string()));
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_with_metadata_returns_both() {
        let backend = InMemoryBackend::new();
        backend
            .put("k1", "hello", PutOptions::overwrite(meta("one")))
            .await
            .unwrap();

        let (value, metadata) = backend.get_with_metadata("k1").await.unwrap().unwrap();
        assert_eq!(value, "hello");
        assert_eq!(metadata.name, "one");
    }

    #[tokio::test]
    async fn create_only_refuses_overwrite() {
        let backend = InMemoryBackend::new();
        backend
            .put("k1", "first", PutOptions::create_only(meta("one")))
            .await
            .unwrap();

        let err = backend
            .put("k1", "second", PutOptions::create_only(meta("one")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        // The original value is untouched.
        assert_eq!(backend.get("k1").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let backend = InMemoryBackend::new();
        backend
            .put(
                "k1",
                "soon gone",
                PutOptions::overwrite(meta("one")).with_ttl(Duration::ZERO),
            )
            .await
            .unwrap();

        assert_eq!(backend.get("k1").await.unwrap(), None);
        assert!(backend.list("").await.unwrap().is_empty());

        // And an expired key may be recreated without overwrite permission.
        backend
            .put("k1", "fresh", PutOptions::create_only(meta("one")))
            .await
            .unwrap();
        assert_eq!(backend.get("k1").await.unwrap(), Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let backend = InMemoryBackend::new();
        for key in ["a-1", "a-2", "b-1"] {
            backend
                .put(key, "v", PutOptions::overwrite(meta(key)))
                .await
                .unwrap();
        }

        let keys = backend.list("a-").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].name, "a-1");
        assert_eq!(keys[1].name, "a-2");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = InMemoryBackend::new();
        backend
            .put("k1", "v", PutOptions::overwrite(meta("one")))
            .await
            .unwrap();

        backend.delete("k1").await.unwrap();
        backend.delete("k1").await.unwrap();
        assert_eq!(backend.get("k1").await.unwrap(), None);
    }
}
