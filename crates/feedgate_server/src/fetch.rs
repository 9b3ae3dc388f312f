//! Outbound HTTP, behind a trait.
//!
//! Capabilities never talk to an HTTP library directly; they go through
//! [`Fetcher`] so tests can script upstream behavior without sockets.

use crate::error::{GatewayError, GatewayResult};
use crate::request::{Request, Response};
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, USER_AGENT};
use http::Method;
use std::time::Duration;
use url::Url;

/// User-Agent sent upstream when the inbound request carries none.
///
/// Some feed hosts refuse unknown agents; this one is universally allowed.
pub const DEFAULT_USER_AGENT: &str = "Overcast/3.0 (+http://overcast.fm/; iOS podcast app)";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Hop-by-hop and conditional headers never forwarded upstream. The
/// conditional pair is stripped so upstreams cannot answer 304 to clients
/// that do not revalidate.
const REQUEST_STRIPPED_HEADERS: [&str; 12] = [
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "if-none-match",
    "if-modified-since",
];

/// Headers dropped from upstream responses before re-emission. Lengths and
/// encodings are recomputed by the transport; policy headers would block
/// rewritten content.
const RESPONSE_STRIPPED_HEADERS: [&str; 7] = [
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "content-security-policy",
    "content-security-policy-report-only",
];

/// Ranged and conditional response headers that old clients mishandle.
/// Stripped from asset-class responses only.
const CACHING_HEADERS: [&str; 4] = ["accept-ranges", "content-range", "etag", "last-modified"];

/// Prepares inbound headers for forwarding upstream.
pub fn sanitize_request_headers(headers: &mut HeaderMap) {
    for name in REQUEST_STRIPPED_HEADERS {
        headers.remove(name);
    }
    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }
}

/// Prepares upstream response headers for re-emission.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    for name in RESPONSE_STRIPPED_HEADERS {
        headers.remove(name);
    }
}

/// Drops ranged and conditional headers from an asset-class response.
pub fn strip_caching_headers(headers: &mut HeaderMap) {
    for name in CACHING_HEADERS {
        headers.remove(name);
    }
}

/// Performs outbound HTTP on behalf of capabilities.
///
/// Implementations are expected to sanitize headers in both directions;
/// test doubles that fabricate responses can skip that.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Sends `request` and returns the upstream response, body collected.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] when the target cannot be
    /// reached. Upstream error *statuses* are not errors here; they come
    /// back as ordinary responses.
    async fn fetch(&self, request: Request) -> GatewayResult<Response>;

    /// Issues a HEAD request to `url`.
    async fn head(&self, url: &Url) -> GatewayResult<Response> {
        self.fetch(Request::new(Method::HEAD, url.clone())).await
    }
}

/// The production [`Fetcher`], backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Internal(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: Request) -> GatewayResult<Response> {
        let mut headers = request.headers;
        sanitize_request_headers(&mut headers);

        let url = request.url;
        let upstream = self
            .client
            .request(request.method, url.clone())
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| GatewayError::Upstream(format!("{url}: {err}")))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        sanitize_response_headers(&mut headers);
        let body = upstream
            .bytes()
            .await
            .map_err(|err| GatewayError::Upstream(format!("{url}: {err}")))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
