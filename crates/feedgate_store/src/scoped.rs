//! Owner-scoped encrypted view over a backend.

use crate::backend::{KeyMetadata, ListedKey, PutOptions, StoreBackend};
use crate::crypto::EnvelopeCipher;
use crate::entry::StoredEntry;
use crate::error::StoreResult;
use std::sync::Arc;
use tracing::warn;

/// A `(service, owner)`-scoped adapter over a [`StoreBackend`].
///
/// Every operation is confined to entries created under the adapter's own
/// scope. Values are sealed with the owner-derived key before they reach
/// the backend and opened on the way out. Scope violations and corrupted
/// values are expected conditions and surface as `None`, never as errors;
/// a foreign entry is indistinguishable from an absent one.
///
/// The backend is chosen once at construction. Nothing in this type probes
/// what kind of backend it holds.
pub struct EncryptedStore {
    backend: Arc<dyn StoreBackend>,
    cipher: EnvelopeCipher,
    service: String,
    owner: String,
}

impl EncryptedStore {
    /// Creates an adapter scoped to `(service, owner)`.
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        secret: &str,
        service: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            cipher: EnvelopeCipher::new(secret),
            service: service.into(),
            owner: owner.into(),
        }
    }

    /// Returns the service namespace this adapter is scoped to.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the owner identity this adapter is scoped to.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Builds an entry already scoped to this adapter, with a fresh key.
    #[must_use]
    pub fn new_entry(&self, name: impl Into<String>, value: impl Into<String>) -> StoredEntry {
        StoredEntry::new(name, value, self.service.clone(), self.owner.clone())
    }

    /// Persists `entry`, returning its key.
    ///
    /// Returns `None` without touching the backend if the entry's scope does
    /// not match the adapter's, or if the key already holds an entry from a
    /// different scope (ownership never changes hands on overwrite).
    ///
    /// # Errors
    ///
    /// Returns an error for backend I/O or sealing faults.
    pub async fn put(&self, entry: StoredEntry) -> StoreResult<Option<String>> {
        if entry.service != self.service || entry.owner != self.owner {
            warn!(
                service = %self.service,
                owner = %self.owner,
                entry_service = %entry.service,
                "store put refused: scope mismatch"
            );
            return Ok(None);
        }

        if let Some(raw) = self.backend.get(&entry.key).await? {
            match serde_json::from_str::<StoredEntry>(&raw) {
                Ok(existing)
                    if existing.service != self.service || existing.owner != self.owner =>
                {
                    warn!(
                        key = %entry.key,
                        service = %self.service,
                        "store put refused: key held by another scope"
                    );
                    return Ok(None);
                }
                Ok(_) => {}
                Err(_) => {
                    // Unreadable record; claim the key.
                    warn!(key = %entry.key, "overwriting unparseable store record");
                }
            }
        }

        let key = entry.key.clone();
        let metadata = KeyMetadata {
            name: entry.name.clone(),
            service: entry.service.clone(),
            owner: entry.owner.clone(),
        };

        let sealed = StoredEntry {
            value: self.cipher.seal(&entry.value, &self.owner)?,
            ..entry
        };
        let record = serde_json::to_string(&sealed)?;

        self.backend
            .put(&key, &record, PutOptions::overwrite(metadata))
            .await?;
        Ok(Some(key))
    }

    /// Fetches and decrypts the entry at `key`.
    ///
    /// Returns `None` if the key is absent, holds an entry from a different
    /// scope, holds an unparseable record, or holds a sealed value that
    /// fails to open.
    ///
    /// # Errors
    ///
    /// Returns an error for backend I/O faults.
    pub async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };

        let Ok(entry) = serde_json::from_str::<StoredEntry>(&raw) else {
            warn!(key, "unparseable store record");
            return Ok(None);
        };

        if entry.service != self.service || entry.owner != self.owner {
            warn!(
                key,
                service = %self.service,
                "store get refused: scope mismatch"
            );
            return Ok(None);
        }

        match self.cipher.open(&entry.value, &self.owner) {
            Some(value) => Ok(Some(StoredEntry { value, ..entry })),
            None => {
                warn!(key, "stored value failed to decrypt");
                Ok(None)
            }
        }
    }

    /// Removes the entry at `key`.
    ///
    /// A key that is absent or scoped to another owner is left untouched;
    /// both are silent no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error for backend I/O faults.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(());
        };
        let Ok(entry) = serde_json::from_str::<StoredEntry>(&raw) else {
            return Ok(());
        };
        if entry.service != self.service || entry.owner != self.owner {
            warn!(
                key,
                service = %self.service,
                "store delete refused: scope mismatch"
            );
            return Ok(());
        }

        self.backend.delete(key).await
    }

    /// Lists the keys in this adapter's scope.
    ///
    /// The backend listing may span every scope; filtering on the recorded
    /// metadata happens here.
    ///
    /// # Errors
    ///
    /// Returns an error for backend I/O faults.
    pub async fn list(&self) -> StoreResult<Vec<ListedKey>> {
        let keys = self.backend.list("").await?;
        Ok(keys
            .into_iter()
            .filter(|k| k.metadata.service == self.service && k.metadata.owner == self.owner)
            .collect())
    }
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("service", &self.service)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::VERSION_PREFIX;
    use crate::memory::InMemoryBackend;

    fn store_pair() -> (Arc<InMemoryBackend>, EncryptedStore, EncryptedStore) {
        let backend = Arc::new(InMemoryBackend::new());
        let alice = EncryptedStore::new(backend.clone(), "secret", "OPML", "alice");
        let mallory = EncryptedStore::new(backend.clone(), "secret", "OPML", "mallory");
        (backend, alice, mallory)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (_, alice, _) = store_pair();

        let entry = alice.new_entry("subs.opml", "<opml version=\"1.0\"/>");
        let key = alice.put(entry).await.unwrap().unwrap();

        let fetched = alice.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.value, "<opml version=\"1.0\"/>");
        assert_eq!(fetched.name, "subs.opml");
        assert_eq!(fetched.owner, "alice");
    }

    #[tokio::test]
    async fn generated_keys_are_uuids() {
        let (_, alice, _) = store_pair();
        let key = alice
            .put(alice.new_entry("n", "v"))
            .await
            .unwrap()
            .unwrap();
        assert!(uuid::Uuid::parse_str(&key).is_ok());
    }

    #[tokio::test]
    async fn backend_never_sees_plaintext() {
        let (backend, alice, _) = store_pair();

        let key = alice
            .put(alice.new_entry("creds", "token=hunter2"))
            .await
            .unwrap()
            .unwrap();

        let raw = backend.raw_value(&key).unwrap();
        assert!(!raw.contains("hunter2"));

        let record: StoredEntry = serde_json::from_str(&raw).unwrap();
        assert!(record.value.starts_with(VERSION_PREFIX));
    }

    #[tokio::test]
    async fn put_refuses_mis_scoped_entry() {
        let (backend, alice, _) = store_pair();

        let foreign = StoredEntry::new("n", "v", "OPML", "somebody-else");
        assert_eq!(alice.put(foreign).await.unwrap(), None);
        assert!(backend.is_empty());

        let wrong_service = StoredEntry::new("n", "v", "MASTO", "alice");
        assert_eq!(alice.put(wrong_service).await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn get_hides_foreign_entries() {
        let (_, alice, mallory) = store_pair();

        let key = alice
            .put(alice.new_entry("private", "alice data"))
            .await
            .unwrap()
            .unwrap();

        // Same backend, same service, correct key - still invisible.
        assert!(mallory.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_ignores_foreign_entries() {
        let (_, alice, mallory) = store_pair();

        let key = alice
            .put(alice.new_entry("private", "alice data"))
            .await
            .unwrap()
            .unwrap();

        mallory.delete(&key).await.unwrap();
        assert!(alice.get(&key).await.unwrap().is_some());

        alice.delete(&key).await.unwrap();
        assert!(alice.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_scope_filtered() {
        let (_, alice, mallory) = store_pair();

        alice.put(alice.new_entry("a1", "v")).await.unwrap();
        alice.put(alice.new_entry("a2", "v")).await.unwrap();
        mallory.put(mallory.new_entry("m1", "v")).await.unwrap();

        let listed = alice.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|k| k.metadata.owner == "alice"));
    }

    #[tokio::test]
    async fn put_never_claims_a_foreign_key() {
        let (_, alice, mallory) = store_pair();

        let key = alice
            .put(alice.new_entry("original", "alice data"))
            .await
            .unwrap()
            .unwrap();

        let takeover = StoredEntry::with_key(&key, "stolen", "mallory data", "OPML", "mallory");
        assert_eq!(mallory.put(takeover).await.unwrap(), None);

        let kept = alice.get(&key).await.unwrap().unwrap();
        assert_eq!(kept.value, "alice data");
    }

    #[tokio::test]
    async fn same_scope_put_updates_in_place() {
        let (_, alice, _) = store_pair();

        let key = alice
            .put(alice.new_entry("doc", "first"))
            .await
            .unwrap()
            .unwrap();
        let update = StoredEntry::with_key(&key, "doc", "second", "OPML", "alice");
        assert_eq!(alice.put(update).await.unwrap(), Some(key.clone()));

        assert_eq!(alice.get(&key).await.unwrap().unwrap().value, "second");
    }

    #[tokio::test]
    async fn corrupted_value_reads_as_absent() {
        let (backend, alice, _) = store_pair();

        let broken = StoredEntry::with_key("k", "n", "v1:not-really-sealed", "OPML", "alice");
        let record = serde_json::to_string(&broken).unwrap();
        backend
            .put("k", &record, PutOptions::overwrite(KeyMetadata::default()))
            .await
            .unwrap();

        assert!(alice.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn legacy_plaintext_value_passes_through() {
        let (backend, alice, _) = store_pair();

        let legacy = StoredEntry::with_key("k", "n", "never encrypted", "OPML", "alice");
        let record = serde_json::to_string(&legacy).unwrap();
        backend
            .put("k", &record, PutOptions::overwrite(KeyMetadata::default()))
            .await
            .unwrap();

        let entry = alice.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, "never encrypted");
    }

    #[tokio::test]
    async fn unparseable_record_reads_as_absent() {
        let (backend, alice, _) = store_pair();

        backend
            .put(
                "k",
                "not json at all",
                PutOptions::overwrite(KeyMetadata::default()),
            )
            .await
            .unwrap();

        assert!(alice.get("k").await.unwrap().is_none());
    }
}
