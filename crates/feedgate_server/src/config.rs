//! Gateway configuration.

use crate::error::{GatewayError, GatewayResult};
use crate::policy::LegacyClientPolicy;
use feedgate_codec::{StripRules, URL_LENGTH_BUDGET};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

/// Environment variable holding the valid caller keys as a JSON array.
pub const KEYS_ENV: &str = "FEEDGATE_KEYS";
/// Environment variable holding the server secret for envelope encryption.
pub const SECRET_ENV: &str = "FEEDGATE_SECRET";
/// Environment variable overriding the externally visible base URL.
pub const PUBLIC_BASE_ENV: &str = "FEEDGATE_PUBLIC_BASE";
/// Environment variable selecting the file store directory.
pub const STORE_PATH_ENV: &str = "FEEDGATE_STORE_PATH";
/// Environment variable overriding the bind address.
pub const BIND_ADDR_ENV: &str = "FEEDGATE_BIND_ADDR";

const DEFAULT_PUBLIC_BASE: &str = "http://127.0.0.1:8080/proxy/";
const DEFAULT_RESIZE_ENDPOINT: &str = "https://wsrv.nl/";

/// Everything the gateway needs to run, loaded once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Caller keys accepted by the auth gate.
    pub valid_keys: Vec<String>,
    /// Secret that envelope-encryption keys are derived from.
    pub server_secret: String,
    /// Externally visible base URL; proxy URLs are composed under it.
    pub public_base: Url,
    /// Address the hosting transport binds to.
    pub bind_addr: SocketAddr,
    /// Directory for the file store. `None` selects the in-memory store.
    pub store_path: Option<PathBuf>,
    /// Days an RSS item stays servable without a fresher publication date.
    pub rss_retention_days: i64,
    /// Days an Atom entry stays servable without a fresher update.
    pub atom_retention_days: i64,
    /// Proxy-URL length at which legacy encoding switches to the store.
    pub url_length_budget: usize,
    /// Tracker-stripping rules applied before encoding.
    pub strip_rules: StripRules,
    /// Legacy-client signatures and entry caps.
    pub policy: LegacyClientPolicy,
    /// Image resize service used for the `image` option.
    pub resize_endpoint: Url,
}

impl GatewayConfig {
    /// Creates a configuration with defaults under the given base URL.
    #[must_use]
    pub fn new(public_base: Url) -> Self {
        Self {
            valid_keys: Vec::new(),
            server_secret: String::new(),
            public_base,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            store_path: None,
            rss_retention_days: 365,
            atom_retention_days: 30,
            url_length_budget: URL_LENGTH_BUDGET,
            strip_rules: StripRules::default(),
            policy: LegacyClientPolicy::default(),
            resize_endpoint: Url::parse(DEFAULT_RESIZE_ENDPOINT)
                .expect("default resize endpoint is well formed"),
        }
    }

    /// Loads configuration from the `FEEDGATE_*` environment variables.
    ///
    /// Keys and secret are required; the rest fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when a required variable is
    /// missing or a value does not parse.
    pub fn from_env() -> GatewayResult<Self> {
        let keys_raw = env::var(KEYS_ENV)
            .map_err(|_| GatewayError::Validation(format!("{KEYS_ENV} is not set")))?;
        let valid_keys: Vec<String> = serde_json::from_str(&keys_raw).map_err(|err| {
            GatewayError::Validation(format!("{KEYS_ENV} is not a JSON string array: {err}"))
        })?;
        let server_secret = env::var(SECRET_ENV)
            .map_err(|_| GatewayError::Validation(format!("{SECRET_ENV} is not set")))?;

        let mut config = Self::default()
            .with_keys(valid_keys)
            .with_secret(server_secret);

        if let Ok(raw) = env::var(PUBLIC_BASE_ENV) {
            config.public_base = Url::parse(&raw).map_err(|err| {
                GatewayError::Validation(format!("{PUBLIC_BASE_ENV} is not a URL: {err}"))
            })?;
        }
        if let Ok(raw) = env::var(STORE_PATH_ENV) {
            config.store_path = Some(PathBuf::from(raw));
        }
        if let Ok(raw) = env::var(BIND_ADDR_ENV) {
            config.bind_addr = raw.parse().map_err(|err| {
                GatewayError::Validation(format!("{BIND_ADDR_ENV} is not an address: {err}"))
            })?;
        }

        Ok(config)
    }

    /// Replaces the valid caller keys.
    #[must_use]
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.valid_keys = keys;
        self
    }

    /// Replaces the server secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.server_secret = secret.into();
        self
    }

    /// Replaces the externally visible base URL.
    #[must_use]
    pub fn with_public_base(mut self, base: Url) -> Self {
        self.public_base = base;
        self
    }

    /// Replaces the bind address.
    #[must_use]
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// Selects the file store rooted at `path`.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Replaces both retention windows, in days.
    #[must_use]
    pub fn with_retention_days(mut self, rss: i64, atom: i64) -> Self {
        self.rss_retention_days = rss;
        self.atom_retention_days = atom;
        self
    }

    /// Replaces both entry caps.
    #[must_use]
    pub fn with_entry_caps(mut self, legacy: usize, modern: usize) -> Self {
        self.policy.legacy_entry_cap = legacy;
        self.policy.modern_entry_cap = modern;
        self
    }

    /// Replaces the URL length budget for legacy encoding.
    #[must_use]
    pub fn with_length_budget(mut self, budget: usize) -> Self {
        self.url_length_budget = budget;
        self
    }

    /// Replaces the tracker-stripping rules.
    #[must_use]
    pub fn with_strip_rules(mut self, rules: StripRules) -> Self {
        self.strip_rules = rules;
        self
    }

    /// Replaces the legacy-client policy.
    #[must_use]
    pub fn with_policy(mut self, policy: LegacyClientPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the image resize endpoint.
    #[must_use]
    pub fn with_resize_endpoint(mut self, endpoint: Url) -> Self {
        self.resize_endpoint = endpoint;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_PUBLIC_BASE).expect("default base URL is well formed"))
    }
}
