//! Shared per-process state handed to every capability.

use crate::auth::AuthGate;
use crate::config::GatewayConfig;
use crate::fetch::Fetcher;
use feedgate_codec::Codec;
use feedgate_store::{EncryptedStore, StoreBackend};
use std::sync::Arc;

/// Service namespace of the legacy URL cache.
pub const URL_CACHE_SERVICE: &str = "URLCACHE";
/// Reserved owner of the legacy URL cache. Entries under it are shared by
/// every caller; the cached values are URLs already visible in feeds.
pub const URL_CACHE_OWNER: &str = "urlcache";
/// Service namespace for saved OPML documents.
pub const OPML_SERVICE: &str = "OPML";
/// Service namespace for Mastodon account credentials.
pub const MASTO_SERVICE: &str = "MASTO";

/// Configuration plus the shared collaborators capabilities work through.
///
/// One context is built per process and shared behind an `Arc`. Everything
/// request-scoped (codecs, store views) is derived from it per call.
pub struct GatewayContext {
    /// The startup configuration.
    pub config: GatewayConfig,
    /// The auth gate, populated from the configured keys.
    pub auth: AuthGate,
    fetcher: Arc<dyn Fetcher>,
    backend: Arc<dyn StoreBackend>,
}

impl GatewayContext {
    /// Builds a context over the given collaborators.
    pub fn new(
        config: GatewayConfig,
        fetcher: Arc<dyn Fetcher>,
        backend: Arc<dyn StoreBackend>,
    ) -> Self {
        let auth = AuthGate::new(config.valid_keys.iter().cloned());
        Self {
            config,
            auth,
            fetcher,
            backend,
        }
    }

    /// The outbound fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Builds a codec for one request.
    ///
    /// The codec carries the caller's key into composed URLs and the
    /// legacy flag into the encoding decision; the URL cache is always
    /// attached so indexed tokens resolve for every caller.
    #[must_use]
    pub fn codec(&self, api_key: &str, legacy_client: bool) -> Codec {
        Codec::new(self.config.public_base.clone(), api_key, legacy_client)
            .with_rules(self.config.strip_rules.clone())
            .with_length_budget(self.config.url_length_budget)
            .with_cache(Arc::new(self.url_cache()))
    }

    /// A store view over the reserved legacy URL cache scope.
    #[must_use]
    pub fn url_cache(&self) -> EncryptedStore {
        self.store(URL_CACHE_SERVICE, URL_CACHE_OWNER)
    }

    /// A store view scoped to `(service, owner)`.
    #[must_use]
    pub fn store(&self, service: &str, owner: &str) -> EncryptedStore {
        EncryptedStore::new(
            self.backend.clone(),
            &self.config.server_secret,
            service,
            owner,
        )
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
