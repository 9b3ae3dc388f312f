//! # Feedgate Server
//!
//! Transport-free gateway core for feedgate.
//!
//! This crate holds everything between a decoded HTTP request and the
//! response the gateway sends back: API-key authentication, capability
//! dispatch, outbound fetching with header sanitization, feed and page
//! rewriting, stored OPML documents, and Mastodon timelines as RSS.
//! Nothing in here listens on a socket; a transport (the CLI binary, or
//! a test) converts its own request type into [`Request`] and hands it
//! to a [`Gateway`].
//!
//! ## Design Principles
//!
//! - Capabilities are tried in registration order; the proxy capability
//!   matches every request and is always registered last
//! - Errors carry an HTTP status and a public message; internal detail
//!   never reaches a client
//! - Upstream error statuses are responses, not errors; they pass
//!   through to the client that asked
//! - Outbound requests never leak the caller's headers, and responses
//!   never leak the upstream's framing or policy headers
//!
//! ## Example
//!
//! ```
//! use feedgate_server::{Gateway, GatewayConfig, Request};
//! use url::Url;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default()
//!     .with_keys(vec!["caller-key".to_string()])
//!     .with_secret("server-secret");
//! let gateway = Gateway::new(config)?;
//!
//! // The bare path serves the submission form without a key.
//! let response = gateway
//!     .handle(Request::get(Url::parse("http://127.0.0.1:8080/")?))
//!     .await;
//! assert!(response.status.is_success());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod capability;
mod config;
mod context;
mod error;
mod fetch;
mod masto;
mod opml;
mod policy;
mod proxy;
mod request;
mod resolver;
mod server;

pub use auth::AuthGate;
pub use capability::{Capability, CapabilityRegistry};
pub use config::{
    GatewayConfig, BIND_ADDR_ENV, KEYS_ENV, PUBLIC_BASE_ENV, SECRET_ENV, STORE_PATH_ENV,
};
pub use context::{
    GatewayContext, MASTO_SERVICE, OPML_SERVICE, URL_CACHE_OWNER, URL_CACHE_SERVICE,
};
pub use error::{GatewayError, GatewayResult};
pub use fetch::{
    sanitize_request_headers, sanitize_response_headers, strip_caching_headers, Fetcher,
    HttpFetcher, DEFAULT_USER_AGENT,
};
pub use masto::MastodonCapability;
pub use opml::OpmlCapability;
pub use policy::LegacyClientPolicy;
pub use proxy::ProxyCapability;
pub use request::{Request, Response};
pub use resolver::OptionResolver;
pub use server::Gateway;
