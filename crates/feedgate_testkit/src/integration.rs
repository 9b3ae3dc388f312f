//! Cross-crate integration helpers.
//!
//! End-to-end flows through an assembled gateway, plus conformance
//! checks every store backend implementation must pass.

use crate::fixtures::{submit_url, TestGateway};
use feedgate_rewrite::XmlDocument;
use feedgate_server::{Request, Response};
use feedgate_store::{KeyMetadata, PutOptions, StoreBackend, StoreError};
use http::header::USER_AGENT;
use std::time::Duration;
use url::Url;

/// Fetches `feed` through a fresh gateway and returns the rewritten
/// response, exactly as a client sending `user_agent` would see it.
pub async fn rewrite_through_gateway(feed: &str, user_agent: Option<&str>) -> Response {
    let gateway = TestGateway::memory();
    gateway
        .upstream
        .route_feed("https://pod.example/feed.xml", feed);
    let proxied = submit_url(&gateway, "https://pod.example/feed.xml", "feed").await;

    let mut request = Request::get(Url::parse(&proxied).expect("proxied URL parses"));
    if let Some(agent) = user_agent {
        request = request.with_header(USER_AGENT, agent);
    }
    gateway.handle(request).await
}

/// Counts `item` elements in an RSS document.
///
/// # Panics
///
/// Panics when `body` is not well-formed XML.
pub fn item_count(body: &str) -> usize {
    let document = XmlDocument::parse(body).expect("feed parses");
    document
        .root
        .child("channel")
        .map(|channel| channel.children_named("item").count())
        .unwrap_or(0)
}

/// Asserts a backend treats expired entries as absent on read and list.
pub async fn assert_backend_expires(backend: &dyn StoreBackend) {
    backend
        .put(
            "expiring",
            "soon gone",
            PutOptions::overwrite(KeyMetadata::default()).with_ttl(Duration::ZERO),
        )
        .await
        .expect("put failed");

    assert_eq!(backend.get("expiring").await.expect("get failed"), None);
    assert!(backend
        .list("expiring")
        .await
        .expect("list failed")
        .is_empty());
}

/// Asserts a backend refuses create-only puts over a live entry.
pub async fn assert_backend_respects_create_only(backend: &dyn StoreBackend) {
    backend
        .put(
            "guarded",
            "first",
            PutOptions::create_only(KeyMetadata::default()),
        )
        .await
        .expect("first put failed");

    let refused = backend
        .put(
            "guarded",
            "second",
            PutOptions::create_only(KeyMetadata::default()),
        )
        .await;
    assert!(
        matches!(refused, Err(StoreError::AlreadyExists { .. })),
        "second create-only put should be refused"
    );
    assert_eq!(
        backend.get("guarded").await.expect("get failed"),
        Some("first".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        feed_with_items, gateway_get, gateway_url, subscription_opml, LEGACY_UA, MODERN_UA,
        TEST_KEY,
    };
    use feedgate_store::{FileBackend, InMemoryBackend};
    use http::StatusCode;

    #[tokio::test]
    async fn legacy_clients_get_the_short_feed() {
        let response = rewrite_through_gateway(&feed_with_items(400), Some(LEGACY_UA)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(item_count(&response.body_text()), 10);
    }

    #[tokio::test]
    async fn clients_without_a_user_agent_count_as_legacy() {
        let response = rewrite_through_gateway(&feed_with_items(400), None).await;
        assert_eq!(item_count(&response.body_text()), 10);
    }

    #[tokio::test]
    async fn modern_clients_get_the_long_feed() {
        let response = rewrite_through_gateway(&feed_with_items(400), Some(MODERN_UA)).await;
        assert_eq!(item_count(&response.body_text()), 30);
    }

    #[tokio::test]
    async fn moved_feed_pointers_never_survive_rewriting() {
        let response = rewrite_through_gateway(&feed_with_items(5), Some(MODERN_UA)).await;
        let body = response.body_text();
        assert!(!body.contains("new-feed-url"));
        assert!(body.contains("/proxy/"));
    }

    #[tokio::test]
    async fn invalid_upstream_xml_is_an_internal_error() {
        let response =
            rewrite_through_gateway("this is not a feed { at all", Some(MODERN_UA)).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn probe_failure_on_playback_is_bad_gateway() {
        // No routes at all: the submitted URL encodes fine with option
        // auto, but the playback probe finds nothing listening.
        let gateway = TestGateway::memory();
        let proxied = submit_url(&gateway, "https://dark.example/feed.xml", "auto").await;

        let response = gateway
            .handle(Request::get(Url::parse(&proxied).unwrap()))
            .await;
        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn garbage_tokens_serve_the_submission_form() {
        let gateway = TestGateway::memory();
        let response = gateway
            .handle(gateway_get(&format!(
                "/proxy/not-a-real-token?key={TEST_KEY}"
            )))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body_text().contains("<form"));
    }

    #[tokio::test]
    async fn form_only_keys_authenticate() {
        let gateway = TestGateway::memory();
        let response = gateway
            .handle(Request::post(gateway_url("/opml")).with_form_body(&[
                ("key", TEST_KEY),
                ("mode", "convert"),
                ("opml", &subscription_opml()),
            ]))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body_text().contains("/proxy/"));
    }

    #[tokio::test]
    async fn saved_lists_survive_a_restart() {
        let gateway = TestGateway::file();
        let saved = gateway
            .handle(Request::post(gateway_url("/opml")).with_form_body(&[
                ("key", TEST_KEY),
                ("mode", "save"),
                ("name", "mine.opml"),
                ("opml", &subscription_opml()),
            ]))
            .await;
        assert_eq!(saved.status, StatusCode::OK);
        let id = saved.body_text();

        let gateway = gateway.restart();

        let listed = gateway
            .handle(gateway_get(&format!("/opml?key={TEST_KEY}&action=list")))
            .await;
        let listing: serde_json::Value = serde_json::from_str(&listed.body_text()).unwrap();
        assert_eq!(listing[0]["id"], id.as_str());
        assert_eq!(listing[0]["name"], "mine.opml");

        let downloaded = gateway
            .handle(gateway_get(&format!(
                "/opml?key={TEST_KEY}&action=download&id={id}"
            )))
            .await;
        assert_eq!(downloaded.status, StatusCode::OK);
        assert!(downloaded.body_text().contains("/proxy/"));
    }

    #[tokio::test]
    async fn memory_backend_conforms() {
        let backend = InMemoryBackend::new();
        assert_backend_expires(&backend).await;
        assert_backend_respects_create_only(&backend).await;
    }

    #[tokio::test]
    async fn file_backend_conforms() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_backend_expires(&backend).await;
        assert_backend_respects_create_only(&backend).await;
    }
}
