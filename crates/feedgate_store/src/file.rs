//! File-based backend for persistent storage.

use crate::backend::{KeyMetadata, ListedKey, PutOptions, StoreBackend};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// On-disk envelope for one entry.
#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord {
    value: String,
    #[serde(default)]
    metadata: KeyMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
}

impl DiskRecord {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| now_unix() >= at)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A file-based key/value backend.
///
/// Each key is one JSON envelope file under the backend directory; the
/// filename is the URL-safe base64 of the key, which keeps arbitrary keys
/// (UUIDs, `KV-` hashes, anything a caller invents) filesystem-safe. Data
/// survives process restarts.
///
/// # Example
///
/// ```no_run
/// use feedgate_store::FileBackend;
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("/var/lib/feedgate/store")).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens a backend rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Returns the backend directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", URL_SAFE_NO_PAD.encode(key)))
    }

    fn key_for(file_name: &str) -> Option<String> {
        let encoded = file_name.strip_suffix(".json")?;
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }

    async fn read_record(&self, key: &str) -> StoreResult<Option<DiskRecord>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: DiskRecord = serde_json::from_slice(&bytes)?;
        if record.is_expired() {
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read_record(key).await?.map(|r| r.value))
    }

    async fn get_with_metadata(&self, key: &str) -> StoreResult<Option<(String, KeyMetadata)>> {
        Ok(self
            .read_record(key)
            .await?
            .map(|r| (r.value, r.metadata)))
    }

    async fn put(&self, key: &str, value: &str, options: PutOptions) -> StoreResult<()> {
        if !options.allow_overwrite && self.read_record(key).await?.is_some() {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }

        let record = DiskRecord {
            value: value.to_string(),
            metadata: options.metadata,
            expires_at: options.expiration_ttl.map(|ttl| now_unix() + ttl.as_secs()),
        };
        let json = serde_json::to_vec(&record)?;
        tokio::fs::write(self.path_for(key), json).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ListedKey>> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            // Files that do not decode back to a key were not written by us.
            let Some(key) = Self::key_for(&file_name.to_string_lossy()) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(record) = self.read_record(&key).await? {
                keys.push(ListedKey {
                    name: key,
                    metadata: record.metadata,
                });
            }
        }
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn meta(name: &str) -> KeyMetadata {
        KeyMetadata {
            name: name.to_string(),
            service: "TEST".to_string(),
            owner: "owner".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend
            .put("k1", "hello", PutOptions::overwrite(meta("one")))
            .await
            .unwrap();

        assert_eq!(backend.get("k1").await.unwrap(), Some("hello".to_string()));
        assert_eq!(backend.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend
                .put("persist", "still here", PutOptions::overwrite(meta("p")))
                .await
                .unwrap();
        }

        let reopened = FileBackend::open(dir.path()).unwrap();
        let (value, metadata) = reopened
            .get_with_metadata("persist")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, "still here");
        assert_eq!(metadata.name, "p");
    }

    #[tokio::test]
    async fn keys_with_awkward_characters() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        let key = "KV-../..\\weird key/with:everything";
        backend
            .put(key, "value", PutOptions::overwrite(meta("w")))
            .await
            .unwrap();

        assert_eq!(backend.get(key).await.unwrap(), Some("value".to_string()));
        let listed = backend.list("KV-").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, key);
    }

    #[tokio::test]
    async fn create_only_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend
            .put("k1", "first", PutOptions::create_only(meta("one")))
            .await
            .unwrap();
        let err = backend
            .put("k1", "second", PutOptions::create_only(meta("one")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend
            .put(
                "k1",
                "gone",
                PutOptions::overwrite(meta("one")).with_ttl(Duration::ZERO),
            )
            .await
            .unwrap();

        assert_eq!(backend.get("k1").await.unwrap(), None);
        assert!(backend.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend
            .put("mine", "v", PutOptions::overwrite(meta("m")))
            .await
            .unwrap();
        std::fs::write(dir.path().join("README.txt"), "not an entry").unwrap();

        let keys = backend.list("").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "mine");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend
            .put("k1", "v", PutOptions::overwrite(meta("one")))
            .await
            .unwrap();
        backend.delete("k1").await.unwrap();
        backend.delete("k1").await.unwrap();
        assert_eq!(backend.get("k1").await.unwrap(), None);
    }
}
