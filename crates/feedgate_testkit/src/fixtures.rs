//! Gateway fixtures and scripted upstreams.
//!
//! Provides a fully assembled gateway over a scriptable upstream, plus
//! generated feed and OPML documents for tests that need realistic
//! input.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use feedgate_server::{
    Fetcher, Gateway, GatewayConfig, GatewayError, GatewayResult, Request, Response,
};
use feedgate_store::{FileBackend, InMemoryBackend};
use http::header::CONTENT_TYPE;
use http::StatusCode;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

/// The API key every fixture gateway accepts.
pub const TEST_KEY: &str = "fixture-key";
/// The server secret every fixture gateway derives value keys from.
pub const TEST_SECRET: &str = "fixture-secret";
/// A user agent no legacy signature matches.
pub const MODERN_UA: &str = "Overcast/3.0 (+http://overcast.fm/)";
/// A user agent the default legacy signatures match.
pub const LEGACY_UA: &str = "iTunes/4.7.1 (Macintosh; U; PPC Mac OS X 10.3.8)";

/// The configuration every fixture gateway runs with.
pub fn test_config() -> GatewayConfig {
    GatewayConfig::default()
        .with_keys(vec![TEST_KEY.to_string()])
        .with_secret(TEST_SECRET)
}

/// The fixture gateway's URL for `path_and_query`.
pub fn gateway_url(path_and_query: &str) -> Url {
    Url::parse(&format!("http://127.0.0.1:8080{path_and_query}"))
        .expect("fixture URL is well formed")
}

/// A GET aimed at the fixture gateway.
pub fn gateway_get(path_and_query: &str) -> Request {
    Request::get(gateway_url(path_and_query))
}

/// A scripted upstream: canned responses matched by URL prefix, with a
/// log of every request the gateway sent out.
#[derive(Default)]
pub struct ScriptedUpstream {
    routes: Mutex<Vec<(String, Response)>>,
    seen: Mutex<Vec<Request>>,
}

impl ScriptedUpstream {
    /// An upstream with no routes; every fetch fails as unreachable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a canned response for URLs starting with `prefix`.
    pub fn route(&self, prefix: &str, response: Response) {
        self.routes.lock().push((prefix.to_string(), response));
    }

    /// Registers an RSS body under `prefix`.
    pub fn route_feed(&self, prefix: &str, body: &str) {
        self.route(
            prefix,
            Response::new(StatusCode::OK)
                .with_header(CONTENT_TYPE, "application/rss+xml")
                .with_body(body.to_string()),
        );
    }

    /// Every request the gateway has sent so far, oldest first.
    pub fn seen(&self) -> Vec<Request> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedUpstream {
    async fn fetch(&self, request: Request) -> GatewayResult<Response> {
        self.seen.lock().push(request.clone());
        let target = request.url.to_string();
        self.routes
            .lock()
            .iter()
            .find(|(prefix, _)| target.starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| GatewayError::Upstream(format!("no scripted route for {target}")))
    }
}

/// A gateway over a scripted upstream, with automatic store cleanup.
pub struct TestGateway {
    /// The assembled gateway.
    pub gateway: Gateway,
    /// The scripted upstream behind it.
    pub upstream: Arc<ScriptedUpstream>,
    _store_dir: Option<TempDir>,
}

impl TestGateway {
    /// An in-memory gateway with the fixture key and secret.
    #[must_use]
    pub fn memory() -> Self {
        let upstream = Arc::new(ScriptedUpstream::new());
        let gateway = Gateway::with_parts(
            test_config(),
            upstream.clone(),
            Arc::new(InMemoryBackend::new()),
        );
        Self {
            gateway,
            upstream,
            _store_dir: None,
        }
    }

    /// A file-backed gateway over a fresh temporary directory.
    #[must_use]
    pub fn file() -> Self {
        Self::over_dir(TempDir::new().expect("failed to create temp store directory"))
    }

    fn over_dir(dir: TempDir) -> Self {
        let upstream = Arc::new(ScriptedUpstream::new());
        let backend = FileBackend::open(dir.path()).expect("failed to open file backend");
        let gateway = Gateway::with_parts(test_config(), upstream.clone(), Arc::new(backend));
        Self {
            gateway,
            upstream,
            _store_dir: Some(dir),
        }
    }

    /// Tears the gateway down and opens a fresh one over the same store
    /// directory, as a process restart would.
    ///
    /// # Panics
    ///
    /// Panics on a memory-backed gateway; there is nothing to reopen.
    #[must_use]
    pub fn restart(self) -> Self {
        let dir = self
            ._store_dir
            .expect("only file-backed gateways can restart");
        Self::over_dir(dir)
    }

    /// The store directory when file-backed.
    pub fn store_path(&self) -> Option<&Path> {
        self._store_dir.as_ref().map(TempDir::path)
    }

    /// Routes one request through the gateway.
    pub async fn handle(&self, request: Request) -> Response {
        self.gateway.handle(request).await
    }
}

/// Submits `target` through the proxy form and returns the proxied URL.
///
/// # Panics
///
/// Panics when the gateway refuses the submission.
pub async fn submit_url(gateway: &TestGateway, target: &str, option: &str) -> String {
    let response = gateway
        .handle(Request::post(gateway_url("/")).with_form_body(&[
            ("key", TEST_KEY),
            ("url", target),
            ("option", option),
        ]))
        .await;
    assert_eq!(
        response.status,
        StatusCode::OK,
        "submission failed: {}",
        response.body_text()
    );
    response.body_text()
}

/// An RSS document with `count` enclosure-bearing items, newest first,
/// all published within the retention window.
pub fn feed_with_items(count: usize) -> String {
    let mut feed = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<rss version=\"2.0\" xmlns:itunes=\"http://www.itunes.com/dtds/podcast-1.0.dtd\">",
        "<channel><title>Fixture Show</title>",
        "<link>https://pod.example/</link>",
        "<description>Generated fixture feed</description>",
        "<itunes:new-feed-url>https://pod.example/moved.xml</itunes:new-feed-url>",
    ));
    let now = Utc::now();
    for index in 0..count {
        let published = (now - Duration::hours(index as i64)).to_rfc2822();
        feed.push_str(&format!(
            "<item><title>Episode {index}</title>\
             <guid isPermaLink=\"false\">fixture-{index}</guid>\
             <pubDate>{published}</pubDate>\
             <enclosure url=\"https://cdn.example/episodes/ep{index}.mp3\" \
             length=\"1\" type=\"audio/mpeg\"/>\
             </item>"
        ));
    }
    feed.push_str("</channel></rss>");
    feed
}

/// A two-feed OPML subscription list with both xmlUrl and htmlUrl
/// attributes.
pub fn subscription_opml() -> String {
    String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<opml version=\"1.0\"><head><title>Subscriptions</title></head><body>",
        "<outline text=\"Fixture Show\" type=\"rss\" ",
        "xmlUrl=\"https://pod.example/feed.xml\" htmlUrl=\"https://pod.example/\"/>",
        "<outline text=\"Other Show\" type=\"rss\" ",
        "xmlUrl=\"https://other.example/rss\"/>",
        "</body></opml>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedgate_rewrite::XmlDocument;

    #[test]
    fn generated_feeds_parse_and_carry_the_moved_pointer() {
        let document = XmlDocument::parse(&feed_with_items(3)).unwrap();
        let channel = document.root.child("channel").unwrap();
        assert_eq!(channel.children_named("item").count(), 3);
        assert!(channel.child("itunes:new-feed-url").is_some());
    }

    #[tokio::test]
    async fn scripted_upstream_routes_by_prefix_and_logs() {
        let upstream = ScriptedUpstream::new();
        upstream.route_feed("https://pod.example/", "<rss/>");

        let hit = upstream
            .fetch(Request::get(
                Url::parse("https://pod.example/feed.xml").unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(hit.status, StatusCode::OK);

        let miss = upstream
            .fetch(Request::get(Url::parse("https://else.example/").unwrap()))
            .await;
        assert!(miss.is_err());
        assert_eq!(upstream.seen().len(), 2);
    }

    #[tokio::test]
    async fn memory_gateway_serves_the_submission_form() {
        let gateway = TestGateway::memory();
        let response = gateway.handle(gateway_get("/")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body_text().contains("<form"));
    }
}
