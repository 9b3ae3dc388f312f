//! Capability trait and dispatch.

use crate::error::GatewayResult;
use crate::request::{Request, Response};
use async_trait::async_trait;
use http::StatusCode;
use tracing::{debug, error};

/// One self-contained feature of the gateway.
///
/// Capabilities are consulted in registration order; the first one whose
/// `matches` returns true handles the request. They hold no per-request
/// state and are shared across concurrent tasks.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// True when this capability should handle `request`.
    fn matches(&self, request: &Request) -> bool;

    /// Handles a request this capability matched.
    async fn handle(&self, request: &Request) -> GatewayResult<Response>;
}

/// An ordered set of capabilities.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<Box<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a capability. Registration order is match order.
    pub fn register(&mut self, capability: impl Capability + 'static) {
        self.entries.push(Box::new(capability));
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routes `request` to the first matching capability and converts any
    /// error into its response. No match is a 404.
    pub async fn dispatch(&self, request: &Request) -> Response {
        for capability in &self.entries {
            if !capability.matches(request) {
                continue;
            }
            debug!(
                capability = capability.name(),
                method = %request.method,
                path = request.url.path(),
                "dispatching request"
            );
            return match capability.handle(request).await {
                Ok(response) => response,
                Err(err) if err.is_server_error() => {
                    error!(capability = capability.name(), error = %err, "request failed");
                    Response::text(err.status(), err.public_message())
                }
                Err(err) => {
                    debug!(capability = capability.name(), error = %err, "request refused");
                    Response::text(err.status(), err.public_message())
                }
            };
        }
        Response::text(StatusCode::NOT_FOUND, "not found")
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|entry| entry.name()).collect();
        f.debug_struct("CapabilityRegistry")
            .field("entries", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use url::Url;

    struct PathStub {
        name: &'static str,
        prefix: &'static str,
        outcome: Result<&'static str, fn() -> GatewayError>,
    }

    #[async_trait]
    impl Capability for PathStub {
        fn name(&self) -> &'static str {
            self.name
        }

        fn matches(&self, request: &Request) -> bool {
            request.url.path().starts_with(self.prefix)
        }

        async fn handle(&self, _request: &Request) -> GatewayResult<Response> {
            match &self.outcome {
                Ok(body) => Ok(Response::text(StatusCode::OK, *body)),
                Err(make) => Err(make()),
            }
        }
    }

    fn request(path: &str) -> Request {
        Request::get(Url::parse(&format!("http://gw{path}")).unwrap())
    }

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register(PathStub {
            name: "first",
            prefix: "/shared",
            outcome: Ok("from first"),
        });
        registry.register(PathStub {
            name: "second",
            prefix: "/shared",
            outcome: Ok("from second"),
        });
        registry.register(PathStub {
            name: "failing",
            prefix: "/broken",
            outcome: Err(|| GatewayError::Auth("missing key".into())),
        });
        registry
    }

    #[tokio::test]
    async fn first_matching_capability_wins() {
        let response = registry().dispatch(&request("/shared/x")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_text(), "from first");
    }

    #[tokio::test]
    async fn no_match_is_a_404() {
        let response = registry().dispatch(&request("/elsewhere")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn errors_become_their_mapped_status() {
        let response = registry().dispatch(&request("/broken/x")).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(response.body_text().contains("missing key"));
    }
}
