//! # Feedgate Store
//!
//! Owner-scoped encrypted object store for feedgate.
//!
//! This crate persists the gateway's long-lived objects: saved OPML
//! subscription lists, Mastodon credentials, and the legacy URL cache used
//! by the codec's short-token fallback. Values never reach a backend in
//! plaintext.
//!
//! ## Design Principles
//!
//! - Backends are plain text-valued key/value stores; they do not interpret
//!   what they hold
//! - Encryption and ownership checks live in [`EncryptedStore`], never in a
//!   backend
//! - Every entry is scoped by a `(service, owner)` pair; an adapter can only
//!   see entries created under its own scope
//! - Expected failures (foreign owner, corrupted blob) are `None`, not errors
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral fallback, for tests and single-process use
//! - [`FileBackend`] - one envelope file per key under a directory
//!
//! ## Example
//!
//! ```
//! use feedgate_store::{EncryptedStore, InMemoryBackend, StoredEntry};
//! use std::sync::Arc;
//!
//! # async fn demo() -> feedgate_store::StoreResult<()> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let store = EncryptedStore::new(backend, "server-secret", "OPML", "caller-key");
//!
//! let entry = StoredEntry::new("subs.opml", "<opml/>", "OPML", "caller-key");
//! let key = store.put(entry).await?;
//! assert!(key.is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod crypto;
mod entry;
mod error;
mod file;
mod memory;
mod scoped;

pub use backend::{KeyMetadata, ListedKey, PutOptions, StoreBackend};
pub use crypto::{EnvelopeCipher, OwnerKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE, VERSION_PREFIX};
pub use entry::StoredEntry;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use scoped::EncryptedStore;
