//! The assembled gateway: configuration, shared state, and the
//! capability registry wired together behind one `handle` call.

use crate::capability::CapabilityRegistry;
use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::error::GatewayResult;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::masto::MastodonCapability;
use crate::opml::OpmlCapability;
use crate::proxy::ProxyCapability;
use crate::request::{Request, Response};
use feedgate_store::{FileBackend, InMemoryBackend, StoreBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// The transport-free gateway core.
///
/// A `Gateway` owns the capability registry and the shared context every
/// capability reads from. Transports hand it a [`Request`] and send back
/// whatever [`Response`] comes out; nothing in here binds a socket.
pub struct Gateway {
    context: Arc<GatewayContext>,
    registry: CapabilityRegistry,
}

impl Gateway {
    /// Builds a gateway from configuration alone, with an HTTP fetcher
    /// and a store backend chosen by `store_path`.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
        let backend: Arc<dyn StoreBackend> = match &config.store_path {
            Some(path) => Arc::new(FileBackend::open(path)?),
            None => Arc::new(InMemoryBackend::new()),
        };
        Ok(Self::with_parts(config, fetcher, backend))
    }

    /// Builds a gateway from explicit parts. Tests use this to swap in
    /// scripted fetchers and in-memory stores.
    #[must_use]
    pub fn with_parts(
        config: GatewayConfig,
        fetcher: Arc<dyn Fetcher>,
        backend: Arc<dyn StoreBackend>,
    ) -> Self {
        if config.valid_keys.is_empty() {
            warn!("no API keys configured; every authenticated operation will be refused");
        }
        let context = Arc::new(GatewayContext::new(config, fetcher, backend));

        // Path-scoped capabilities first; the proxy matches everything
        // and must stay last.
        let mut registry = CapabilityRegistry::new();
        registry.register(OpmlCapability::new(context.clone()));
        registry.register(MastodonCapability::new(context.clone()));
        registry.register(ProxyCapability::new(context.clone()));
        info!(capabilities = registry.len(), "gateway assembled");

        Self { context, registry }
    }

    /// Routes one request through the registry and returns the response.
    pub async fn handle(&self, request: Request) -> Response {
        self.registry.dispatch(&request).await
    }

    /// The configuration this gateway was built with.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.context.config
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
