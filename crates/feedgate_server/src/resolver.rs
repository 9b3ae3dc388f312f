//! Content-type probing for the `auto` option.

use crate::fetch::Fetcher;
use feedgate_codec::ContentOption;
use http::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

/// Resolves `auto` to a concrete content option by probing the target.
pub struct OptionResolver<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> OptionResolver<'a> {
    /// Creates a resolver over the given fetcher.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    /// Issues a HEAD request and maps the Content-Type to an option.
    ///
    /// A missing Content-Type maps to `asset`, like any unrecognized type.
    /// A failed probe returns `None`: the target is unreachable and the
    /// caller decides what that means for the request.
    pub async fn probe(&self, target: &Url) -> Option<ContentOption> {
        match self.fetcher.head(target).await {
            Ok(response) => {
                let content_type = response.header(CONTENT_TYPE).unwrap_or("");
                let option = ContentOption::from_content_type(content_type);
                debug!(target = %target, content_type, option = option.as_str(), "probed target");
                Some(option)
            }
            Err(err) => {
                warn!(target = %target, error = %err, "HEAD probe failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GatewayError, GatewayResult};
    use crate::request::{Request, Response};
    use async_trait::async_trait;
    use http::StatusCode;

    struct ProbeStub {
        content_type: Option<&'static str>,
        unreachable: bool,
    }

    #[async_trait]
    impl Fetcher for ProbeStub {
        async fn fetch(&self, request: Request) -> GatewayResult<Response> {
            if self.unreachable {
                return Err(GatewayError::Upstream(format!("{}: refused", request.url)));
            }
            let mut response = Response::new(StatusCode::OK);
            if let Some(content_type) = self.content_type {
                response = response.with_header(CONTENT_TYPE, content_type);
            }
            Ok(response)
        }
    }

    async fn probe(content_type: Option<&'static str>) -> Option<ContentOption> {
        let stub = ProbeStub {
            content_type,
            unreachable: false,
        };
        let target = Url::parse("http://target.example/thing").unwrap();
        OptionResolver::new(&stub).probe(&target).await
    }

    #[tokio::test]
    async fn content_types_map_to_options() {
        assert_eq!(
            probe(Some("application/rss+xml; charset=utf-8")).await,
            Some(ContentOption::Feed)
        );
        assert_eq!(probe(Some("text/xml")).await, Some(ContentOption::Feed));
        assert_eq!(
            probe(Some("text/html; charset=utf-8")).await,
            Some(ContentOption::Html)
        );
        assert_eq!(probe(Some("image/png")).await, Some(ContentOption::Image));
        assert_eq!(
            probe(Some("audio/mpeg")).await,
            Some(ContentOption::Asset)
        );
    }

    #[tokio::test]
    async fn missing_content_type_is_an_asset() {
        assert_eq!(probe(None).await, Some(ContentOption::Asset));
    }

    #[tokio::test]
    async fn unreachable_target_probes_to_none() {
        let stub = ProbeStub {
            content_type: None,
            unreachable: true,
        };
        let target = Url::parse("http://gone.example/feed").unwrap();
        assert_eq!(OptionResolver::new(&stub).probe(&target).await, None);
    }
}
