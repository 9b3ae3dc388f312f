//! Serve command implementation.
//!
//! Binds the axum transport adapter over a [`Gateway`]: every route
//! falls through to a single handler that converts between axum's
//! request type and the gateway's transport-free model.

use axum::body::Body;
use axum::extract::State;
use feedgate_server::{Gateway, GatewayConfig, Request, Response};
use http::header::HOST;
use http::StatusCode;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

/// Largest request body the adapter will buffer.
const BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Runs the serve command.
pub async fn run(
    bind: Option<SocketAddr>,
    store: Option<PathBuf>,
    base: Option<Url>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::from_env()?;
    if let Some(bind) = bind {
        config = config.with_bind_addr(bind);
    }
    if let Some(store) = store {
        config = config.with_store_path(store);
    }
    if let Some(base) = base {
        config = config.with_public_base(base);
    }

    let addr = config.bind_addr;
    let gateway = Arc::new(Gateway::new(config)?);

    let app = axum::Router::new().fallback(handle).with_state(gateway);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "feedgate listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle(
    State(gateway): State<Arc<Gateway>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(body) => body,
        Err(_) => return plain_error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
    };
    let Some(url) = request_url(&parts) else {
        return plain_error(StatusCode::BAD_REQUEST, "unparseable request URL");
    };

    let gateway_request = Request {
        method: parts.method,
        url,
        headers: parts.headers,
        body,
    };
    into_axum(gateway.handle(gateway_request).await)
}

/// Rebuilds the absolute request URL from the request line and Host
/// header. The host is a routing hint only; decoded targets come from
/// the path token.
fn request_url(parts: &http::request::Parts) -> Option<Url> {
    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("127.0.0.1");
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    Url::parse(&format!("http://{host}{path_and_query}")).ok()
}

fn into_axum(response: Response) -> axum::response::Response {
    let mut out = axum::response::Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out
}

fn plain_error(status: StatusCode, message: &str) -> axum::response::Response {
    into_axum(Response::text(status, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_for(uri: &str, host: Option<&str>) -> http::request::Parts {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn request_urls_rebuild_from_host_and_path() {
        let parts = parts_for("/proxy/abc?key=k", Some("gw.example:8080"));
        let url = request_url(&parts).unwrap();
        assert_eq!(url.as_str(), "http://gw.example:8080/proxy/abc?key=k");
    }

    #[test]
    fn missing_host_falls_back_to_loopback() {
        let parts = parts_for("/", None);
        assert_eq!(request_url(&parts).unwrap().as_str(), "http://127.0.0.1/");
    }

    #[test]
    fn responses_carry_status_headers_and_body() {
        let axum_response = into_axum(Response::text(StatusCode::IM_A_TEAPOT, "short and stout"));
        assert_eq!(axum_response.status(), StatusCode::IM_A_TEAPOT);
        assert!(axum_response
            .headers()
            .contains_key(http::header::CONTENT_TYPE));
    }
}
