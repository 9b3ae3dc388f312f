//! The proxy capability: decode, fetch, rewrite, re-emit.

use crate::capability::Capability;
use crate::context::GatewayContext;
use crate::error::{GatewayError, GatewayResult};
use crate::fetch::strip_caching_headers;
use crate::request::{Request, Response};
use crate::resolver::OptionResolver;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use feedgate_codec::{Codec, ContentOption};
use feedgate_rewrite::{rewrite_html, FeedRewriter};
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const RESIZE_DIMENSION: &str = "1024";
const RESIZE_QUALITY: &str = "75";

/// The page served when a request carries neither a token nor a `url`
/// parameter. Plain markup; the clients this gateway exists for predate
/// CSS worth writing.
const SUBMISSION_FORM_PAGE: &str = r#"<!doctype html>
<html>
<head><title>feedgate</title></head>
<body>
<h1>feedgate</h1>
<p>Create a proxy URL for a feed, page, or file.</p>
<form method="post" action="">
<p><label>Key <input name="key" type="password"></label></p>
<p><label>URL <input name="url" size="60" placeholder="https://example.com/feed.xml"></label></p>
<p><label>Type <select name="option">
<option value="auto" selected>auto</option>
<option value="feed">feed</option>
<option value="html">html</option>
<option value="asset">asset</option>
<option value="image">image</option>
</select></label></p>
<p><button type="submit">Create proxy URL</button></p>
</form>
</body>
</html>
"#;

/// Serves proxied content: feeds, pages, assets, and images.
///
/// This is the default capability; it matches everything the path-scoped
/// capabilities decline, so it must be registered last.
pub struct ProxyCapability {
    context: Arc<GatewayContext>,
}

impl ProxyCapability {
    /// Creates the capability over the shared context.
    #[must_use]
    pub fn new(context: Arc<GatewayContext>) -> Self {
        Self { context }
    }

    /// Encodes a submitted URL and answers with the proxy URL as text.
    ///
    /// `auto` is narrowed by probing the target so the composed URL carries
    /// a concrete option; an unreachable target keeps `auto` and the probe
    /// happens again when the URL is first used.
    async fn encode_submission(
        &self,
        codec: &Codec,
        raw: &str,
        option: ContentOption,
    ) -> GatewayResult<Response> {
        let target = Url::parse(raw.trim()).map_err(|_| {
            GatewayError::Validation(format!("url parameter is not an absolute URL: {raw}"))
        })?;

        let option = match option {
            ContentOption::Auto => {
                match OptionResolver::new(self.context.fetcher()).probe(&target).await {
                    Some(resolved) => resolved,
                    None => {
                        debug!(target = %target, "probe failed; keeping auto");
                        ContentOption::Auto
                    }
                }
            }
            concrete => concrete,
        };

        let proxied = codec.encode(&target, option).await;
        Ok(Response::text(StatusCode::OK, proxied.as_str()))
    }

    async fn serve_target(
        &self,
        request: &Request,
        codec: &Codec,
        target: &Url,
        option: ContentOption,
    ) -> GatewayResult<Response> {
        let option = match option {
            ContentOption::Auto => OptionResolver::new(self.context.fetcher())
                .probe(target)
                .await
                .ok_or_else(|| {
                    GatewayError::Upstream(format!("{target} did not answer a probe"))
                })?,
            concrete => concrete,
        };

        // Old clients POST media player range requests and form replies
        // straight at proxy URLs; anything that is not a GET forwards as-is.
        if request.method != Method::GET {
            return self.passthrough(request, target).await;
        }

        match option {
            ContentOption::Feed => self.serve_feed(request, codec, target).await,
            ContentOption::Html => self.serve_html(request, codec, target).await,
            ContentOption::Image => self.serve_image(target).await,
            ContentOption::Asset | ContentOption::Auto => self.passthrough(request, target).await,
        }
    }

    /// Forwards the inbound request to `target`, headers and body included.
    async fn forward(&self, request: &Request, target: &Url) -> GatewayResult<Response> {
        let outbound = Request {
            method: request.method.clone(),
            url: target.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        };
        self.context.fetcher().fetch(outbound).await
    }

    async fn serve_feed(
        &self,
        request: &Request,
        codec: &Codec,
        target: &Url,
    ) -> GatewayResult<Response> {
        let upstream = self.forward(request, target).await?;
        if !upstream.status.is_success() {
            debug!(status = %upstream.status, target = %target, "passing through upstream status");
            return Ok(upstream);
        }

        let cap = self
            .context
            .config
            .policy
            .entry_cap(codec.is_legacy_client());
        let rewriter = FeedRewriter::new(codec, cap).with_retention(
            Duration::days(self.context.config.rss_retention_days),
            Duration::days(self.context.config.atom_retention_days),
        );
        let rewritten = rewriter.rewrite(&upstream.body_text()).await?;

        let response = Response {
            status: upstream.status,
            headers: upstream.headers,
            body: Bytes::from(rewritten),
        };
        Ok(response.with_header(CONTENT_TYPE, "text/xml; charset=utf-8"))
    }

    async fn serve_html(
        &self,
        request: &Request,
        codec: &Codec,
        target: &Url,
    ) -> GatewayResult<Response> {
        let upstream = self.forward(request, target).await?;
        if !upstream.status.is_success() {
            debug!(status = %upstream.status, target = %target, "passing through upstream status");
            return Ok(upstream);
        }

        let rewritten = rewrite_html(&upstream.body_text(), codec)?;
        Ok(Response {
            status: upstream.status,
            headers: upstream.headers,
            body: Bytes::from(rewritten),
        })
    }

    async fn serve_image(&self, target: &Url) -> GatewayResult<Response> {
        let resize = resize_url(&self.context.config.resize_endpoint, target);
        let mut response = self.context.fetcher().fetch(Request::get(resize)).await?;
        strip_caching_headers(&mut response.headers);
        Ok(response)
    }

    async fn passthrough(&self, request: &Request, target: &Url) -> GatewayResult<Response> {
        let mut response = self.forward(request, target).await?;
        strip_caching_headers(&mut response.headers);
        Ok(response)
    }
}

/// Composes the resize-service URL for `target`.
///
/// The service scales down to fit a 1024px box, never enlarges, and
/// transcodes to JPEG; old clients choke on progressive JPEG, WebP, and
/// multi-megapixel originals alike.
fn resize_url(endpoint: &Url, target: &Url) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("url", target.as_str())
        .append_pair("w", RESIZE_DIMENSION)
        .append_pair("h", RESIZE_DIMENSION)
        .append_pair("fit", "inside")
        .append_key_only("we")
        .append_pair("output", "jpg")
        .append_pair("q", RESIZE_QUALITY);
    url
}

#[async_trait]
impl Capability for ProxyCapability {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn matches(&self, _request: &Request) -> bool {
        true
    }

    async fn handle(&self, request: &Request) -> GatewayResult<Response> {
        let caller = self.context.auth.validate(request);
        let legacy = self
            .context
            .config
            .policy
            .is_legacy_user_agent(request.user_agent());
        let codec = self
            .context
            .codec(caller.as_deref().unwrap_or(""), legacy);

        let decoded = codec.decode(&request.url).await;
        let submitted = request.param("url");

        // The form page renders without a key; everything with a target
        // requires one.
        if decoded.is_none() && submitted.is_none() {
            return Ok(Response::html(StatusCode::OK, SUBMISSION_FORM_PAGE));
        }
        if caller.is_none() {
            return Err(GatewayError::Auth("missing or invalid key".to_string()));
        }

        let option = ContentOption::parse(request.param("option").as_deref());
        match decoded {
            Some(target) => self.serve_target(request, &codec, &target, option).await,
            None => {
                let raw = submitted.unwrap_or_default();
                self.encode_submission(&codec, &raw, option).await
            }
        }
    }
}
