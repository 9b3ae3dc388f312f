//! Caller authentication.

use crate::request::Request;
use std::collections::HashSet;
use tracing::debug;

/// Validates caller keys against the configured set.
///
/// The set is populated once at startup and read-only afterwards. A key is
/// looked up in the query string first; form POSTs are allowed to carry it
/// in the body instead, for clients that cannot edit URLs. Validation never
/// errors: absent, malformed, and unknown keys are all just
/// "unauthenticated."
#[derive(Debug, Clone)]
pub struct AuthGate {
    keys: HashSet<String>,
}

impl AuthGate {
    /// Builds a gate over the given keys.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// True when no keys are configured. Such a gate refuses everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the caller's key if the request presents a valid one.
    ///
    /// The query string wins over the form body; a key that is present in
    /// the query but invalid is not retried against the form.
    #[must_use]
    pub fn validate(&self, request: &Request) -> Option<String> {
        let candidate = request.param("key")?;
        if self.keys.contains(&candidate) {
            Some(candidate)
        } else {
            debug!(path = request.url.path(), "unknown caller key");
            None
        }
    }
}
