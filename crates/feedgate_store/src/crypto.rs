//! Envelope encryption for stored values.
//!
//! Values are sealed under a per-owner key derived from the server secret,
//! so a leaked backend (or a bug that crosses owner scopes) exposes only
//! ciphertext. The wire format is a versioned, base64-wrapped blob:
//!
//! ```text
//! "v1:" + base64(nonce (12 bytes) || ciphertext || tag (16 bytes))
//! ```
//!
//! Values without the version prefix are treated as legacy plaintext and
//! returned unchanged; values with the prefix that fail authentication are
//! treated as absent.

use crate::error::{StoreError, StoreResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Marker prefixed to every sealed value.
pub const VERSION_PREFIX: &str = "v1:";

/// A symmetric key scoped to one owner.
///
/// Derived as `SHA-256(server_secret || owner)`, so every owner decrypts
/// under a different key without any per-owner key storage.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct OwnerKey {
    bytes: [u8; KEY_SIZE],
}

impl OwnerKey {
    /// Derives the key for `owner` from the server secret.
    #[must_use]
    pub fn derive(secret: &str, owner: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(owner.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&digest);
        Self { bytes }
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Seals and opens stored values with per-owner keys.
pub struct EnvelopeCipher {
    secret: String,
}

impl EnvelopeCipher {
    /// Creates a cipher around the server secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Encrypts `plaintext` for `owner` into the versioned blob format.
    ///
    /// A fresh random nonce is drawn per call, so sealing the same value
    /// twice yields different blobs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encryption`] if the AEAD primitive fails.
    pub fn seal(&self, plaintext: &str, owner: &str) -> StoreResult<String> {
        let key = OwnerKey::derive(&self.secret, owner);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| StoreError::Encryption(format!("sealing failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(format!("{VERSION_PREFIX}{}", STANDARD.encode(blob)))
    }

    /// Decrypts a stored value for `owner`.
    ///
    /// A value without the version prefix was never sealed and is returned
    /// unchanged. A prefixed value that fails base64 decoding, is too short
    /// to hold a nonce and tag, or fails authentication yields `None` -
    /// corrupted ciphertext is operationally the same as absence.
    #[must_use]
    pub fn open(&self, stored: &str, owner: &str) -> Option<String> {
        let Some(encoded) = stored.strip_prefix(VERSION_PREFIX) else {
            return Some(stored.to_string());
        };

        let blob = STANDARD.decode(encoded).ok()?;
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return None;
        }

        let key = OwnerKey::derive(&self.secret, owner);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let cipher = EnvelopeCipher::new("server-secret");
        let sealed = cipher.seal("podcast credentials", "owner-a").unwrap();
        let opened = cipher.open(&sealed, "owner-a").unwrap();
        assert_eq!(opened, "podcast credentials");
    }

    #[test]
    fn sealed_blob_is_versioned_and_opaque() {
        let cipher = EnvelopeCipher::new("server-secret");
        let sealed = cipher.seal("visible", "owner-a").unwrap();
        assert!(sealed.starts_with(VERSION_PREFIX));
        assert_ne!(sealed, "visible");
        assert!(!sealed.contains("visible"));
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let cipher = EnvelopeCipher::new("server-secret");
        let a = cipher.seal("same value", "owner-a").unwrap();
        let b = cipher.seal("same value", "owner-a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unversioned_value_passes_through() {
        let cipher = EnvelopeCipher::new("server-secret");
        assert_eq!(
            cipher.open("plain legacy value", "owner-a"),
            Some("plain legacy value".to_string())
        );
    }

    #[test]
    fn wrong_owner_fails_to_open() {
        let cipher = EnvelopeCipher::new("server-secret");
        let sealed = cipher.seal("secret", "owner-a").unwrap();
        assert_eq!(cipher.open(&sealed, "owner-b"), None);
    }

    #[test]
    fn wrong_secret_fails_to_open() {
        let sealer = EnvelopeCipher::new("secret-one");
        let opener = EnvelopeCipher::new("secret-two");
        let sealed = sealer.seal("secret", "owner-a").unwrap();
        assert_eq!(opener.open(&sealed, "owner-a"), None);
    }

    #[test]
    fn tampered_blob_fails_to_open() {
        let cipher = EnvelopeCipher::new("server-secret");
        let sealed = cipher.seal("secret", "owner-a").unwrap();

        let mut blob = STANDARD
            .decode(sealed.strip_prefix(VERSION_PREFIX).unwrap())
            .unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = format!("{VERSION_PREFIX}{}", STANDARD.encode(blob));

        assert_eq!(cipher.open(&tampered, "owner-a"), None);
    }

    #[test]
    fn truncated_blob_fails_to_open() {
        let cipher = EnvelopeCipher::new("server-secret");
        let short = format!("{VERSION_PREFIX}{}", STANDARD.encode([0u8; 8]));
        assert_eq!(cipher.open(&short, "owner-a"), None);
    }

    #[test]
    fn garbage_base64_fails_to_open() {
        let cipher = EnvelopeCipher::new("server-secret");
        assert_eq!(cipher.open("v1:!!!not-base64!!!", "owner-a"), None);
    }

    #[test]
    fn keys_differ_per_owner() {
        let a = OwnerKey::derive("secret", "owner-a");
        let b = OwnerKey::derive("secret", "owner-b");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn debug_redacts_material() {
        let key = OwnerKey::derive("secret", "owner");
        assert!(format!("{key:?}").contains("[REDACTED]"));

        let cipher = EnvelopeCipher::new("hunter2");
        let debug = format!("{cipher:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
