//! The stored entry model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One object held by the store.
///
/// `service` and `owner` together form the authorization scope; they are
/// fixed at creation and checked by every scoped operation. The `value` is
/// plaintext on this type; it only exists in encrypted form inside a
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Storage key. Server-generated when the caller does not supply one.
    pub key: String,
    /// Human-readable label (e.g. an uploaded filename).
    pub name: String,
    /// The payload.
    pub value: String,
    /// Service namespace, e.g. `OPML` or `MASTO`.
    pub service: String,
    /// Caller identity the entry belongs to.
    pub owner: String,
}

impl StoredEntry {
    /// Creates an entry with a fresh random key.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        service: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self::with_key(Uuid::new_v4().to_string(), name, value, service, owner)
    }

    /// Creates an entry under a caller-chosen key.
    #[must_use]
    pub fn with_key(
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        service: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            value: value.into(),
            service: service.into(),
            owner: owner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_keys() {
        let a = StoredEntry::new("a", "v", "TEST", "owner");
        let b = StoredEntry::new("b", "v", "TEST", "owner");
        assert_ne!(a.key, b.key);
        assert!(Uuid::parse_str(&a.key).is_ok());
    }

    #[test]
    fn with_key_preserves_key() {
        let entry = StoredEntry::with_key("KV-abc123", "cache", "url", "URLCACHE", "gateway");
        assert_eq!(entry.key, "KV-abc123");
        assert_eq!(entry.service, "URLCACHE");
    }

    #[test]
    fn serializes_all_fields() {
        let entry = StoredEntry::with_key("k", "n", "v", "s", "o");
        let json = serde_json::to_string(&entry).unwrap();
        let back: StoredEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
