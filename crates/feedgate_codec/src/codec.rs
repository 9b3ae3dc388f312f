//! Proxy-token encoding and decoding.

use crate::filename::{sanitize_file_name, MAX_FILE_NAME_LEN};
use crate::option::ContentOption;
use crate::strip::StripRules;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use feedgate_store::{EncryptedStore, StoredEntry};
use md5::{Digest, Md5};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Path segment that marks where the token begins in a proxy URL.
pub const PATH_MARKER: &str = "proxy";

/// Prefix of indexed (store-resolved) tokens.
pub const KV_PREFIX: &str = "KV-";

/// Proxy URLs at or past this length take the indexed fallback for legacy
/// clients. Old clients hold URLs in fixed 255-byte buffers.
pub const URL_LENGTH_BUDGET: usize = 255;

/// The escape set of JavaScript's `encodeURIComponent`: everything but
/// alphanumerics and `- _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encodes target URLs into opaque proxy tokens and back.
///
/// A codec is built per request: it carries the caller's key, whether the
/// caller is a legacy client, and (optionally) a handle to the reserved
/// legacy-cache scope of the store for the indexed fallback.
#[derive(Debug)]
pub struct Codec {
    base: Url,
    api_key: String,
    legacy_client: bool,
    rules: StripRules,
    cache: Option<Arc<EncryptedStore>>,
    length_budget: usize,
}

impl Codec {
    /// Creates a codec that composes proxy URLs under `base`.
    ///
    /// The base is normalized to end with `/` so tokens join as path
    /// segments. Decoding looks for the `proxy` marker segment, so a base
    /// that does not end in `proxy/` will produce URLs this codec cannot
    /// decode; that earns a warning, not an error.
    #[must_use]
    pub fn new(mut base: Url, api_key: impl Into<String>, legacy_client: bool) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        if !base.path().ends_with(&format!("{PATH_MARKER}/")) {
            warn!(base = %base, "base URL does not end with {PATH_MARKER}/");
        }
        Self {
            base,
            api_key: api_key.into(),
            legacy_client,
            rules: StripRules::default(),
            cache: None,
            length_budget: URL_LENGTH_BUDGET,
        }
    }

    /// Replaces the tracker-stripping rules.
    #[must_use]
    pub fn with_rules(mut self, rules: StripRules) -> Self {
        self.rules = rules;
        self
    }

    /// Attaches the reserved legacy-cache store scope, enabling indexed
    /// tokens.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<EncryptedStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Overrides the URL length budget that triggers the indexed fallback.
    #[must_use]
    pub fn with_length_budget(mut self, budget: usize) -> Self {
        self.length_budget = budget;
        self
    }

    /// Returns the proxy base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Returns the caller key baked into composed URLs.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns whether this codec encodes for a legacy client.
    #[must_use]
    pub fn is_legacy_client(&self) -> bool {
        self.legacy_client
    }

    /// Returns the stripping rules in use.
    #[must_use]
    pub fn rules(&self) -> &StripRules {
        &self.rules
    }

    /// Encodes `target` into an inline-token proxy URL.
    ///
    /// Pure: no I/O, no fallback. The target is tracker-stripped first;
    /// the stripped URL is what the token decodes back to.
    #[must_use]
    pub fn encode_inline(&self, target: &Url, option: ContentOption) -> Url {
        let stripped = self.rules.strip(target);
        let file_name = sanitize_file_name(stripped.path(), option, MAX_FILE_NAME_LEN);

        let component = utf8_percent_encode(stripped.as_str(), COMPONENT).to_string();
        let token = utf8_percent_encode(&STANDARD.encode(component.as_bytes()), COMPONENT)
            .to_string();

        self.compose(&token, &file_name, option)
    }

    /// Encodes `target`, taking the indexed fallback when the caller is a
    /// legacy client, the inline URL breaches the length budget, and a
    /// cache scope is attached.
    ///
    /// The fallback persists `KV-{md5(stripped)} -> stripped` in the cache
    /// and composes a short URL around that token. A refused or failed
    /// cache write degrades to the inline URL; a long URL is better than
    /// no feed.
    pub async fn encode(&self, target: &Url, option: ContentOption) -> Url {
        let inline = self.encode_inline(target, option);
        if !self.legacy_client {
            return inline;
        }
        let Some(cache) = self.cache.as_ref() else {
            return inline;
        };
        if inline.as_str().len() < self.length_budget {
            return inline;
        }

        let stripped = self.rules.strip(target);
        let token = format!("{KV_PREFIX}{}", md5_hex(stripped.as_str()));
        let entry = StoredEntry::with_key(
            &token,
            &token,
            stripped.as_str(),
            cache.service(),
            cache.owner(),
        );

        match cache.put(entry).await {
            Ok(Some(_)) => {
                debug!(token, target = %stripped, "cached long target under indexed token");
                let file_name = sanitize_file_name(stripped.path(), option, MAX_FILE_NAME_LEN);
                self.compose(&token, &file_name, option)
            }
            Ok(None) => {
                warn!(token, "legacy cache refused write; keeping inline token");
                inline
            }
            Err(err) => {
                warn!(token, error = %err, "legacy cache write failed; keeping inline token");
                inline
            }
        }
    }

    /// Decodes the target URL out of a proxy request URL.
    ///
    /// Finds the token in the segment after the `proxy` path marker.
    /// Indexed tokens resolve through the cache; inline tokens reverse the
    /// escape/base64 chain. Every failure mode - no marker, malformed
    /// token, missing cache entry, non-URL payload - is `None`. Decode
    /// never errors.
    pub async fn decode(&self, request_url: &Url) -> Option<Url> {
        let token = request_url
            .path_segments()?
            .skip_while(|segment| *segment != PATH_MARKER)
            .nth(1)?;
        if token.is_empty() {
            return None;
        }

        if token.starts_with(KV_PREFIX) {
            if let Some(cache) = self.cache.as_ref() {
                return match cache.get(token).await {
                    Ok(Some(entry)) => {
                        let target = Url::parse(&entry.value).ok();
                        if target.is_none() {
                            warn!(token, "cached value is not an absolute URL");
                        }
                        target
                    }
                    Ok(None) => {
                        debug!(token, "indexed token has no cache entry");
                        None
                    }
                    Err(err) => {
                        warn!(token, error = %err, "legacy cache read failed");
                        None
                    }
                };
            }
            // No cache attached; the inline chain below will reject it.
        }

        decode_inline(token)
    }

    fn compose(&self, token: &str, file_name: &str, option: ContentOption) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}{token}/{file_name}", self.base.path());
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("key", &self.api_key)
            .append_pair("option", option.as_str());
        url
    }
}

fn decode_inline(token: &str) -> Option<Url> {
    let escaped_base = percent_decode_str(token).decode_utf8().ok()?;
    let component = STANDARD.decode(escaped_base.as_bytes()).ok()?;
    let component = String::from_utf8(component).ok()?;
    let target = percent_decode_str(&component).decode_utf8().ok()?;
    Url::parse(&target).ok()
}

fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
