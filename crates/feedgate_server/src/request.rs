//! Transport-free request and response model.
//!
//! The gateway core works on these plain values; the hosting binary adapts
//! whatever HTTP server it embeds to them. Keeping the core off any
//! framework type makes every capability drivable from a unit test.

use bytes::Bytes;
use http::header::{AsHeaderName, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use tracing::debug;
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An inbound request as the gateway core sees it.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Full request URL, query string included.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body. Empty for bodyless methods.
    pub body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a header. A value that is not valid header text is dropped.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => debug!(header = %name, "dropping unrepresentable header value"),
        }
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the body with URL-encoded form fields and sets the matching
    /// content type.
    #[must_use]
    pub fn with_form_body(self, fields: &[(&str, &str)]) -> Self {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in fields {
            serializer.append_pair(name, value);
        }
        let encoded = serializer.finish();
        self.with_header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .with_body(encoded)
    }

    /// Returns a header value as text, if present and representable.
    #[must_use]
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the User-Agent header, if any.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.header(USER_AGENT)
    }

    /// Returns the decoded value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// True when this is a POST carrying a URL-encoded form body.
    #[must_use]
    pub fn is_form_post(&self) -> bool {
        self.method == Method::POST
            && self
                .header(CONTENT_TYPE)
                .is_some_and(|value| value.to_ascii_lowercase().contains(FORM_CONTENT_TYPE))
    }

    /// Returns the decoded value of a form field, for form POSTs only.
    #[must_use]
    pub fn form_param(&self, name: &str) -> Option<String> {
        if !self.is_form_post() {
            return None;
        }
        form_urlencoded::parse(&self.body)
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Looks a parameter up in the query string first, then in the form
    /// body when the request is a form POST.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        self.query_param(name)
            .or_else(|| self.form_param(name))
    }
}

/// An outbound response as the gateway core produces it.
#[derive(Debug, Clone)]
pub struct Response {
    /// Response status.
    pub status: StatusCode,
    /// Response headers. Content-Length is never set here; the transport
    /// recomputes it from the body.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a `text/plain` response.
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    /// Creates a `text/html` response.
    #[must_use]
    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "text/html; charset=utf-8")
            .with_body(body.into())
    }

    /// Creates an `application/json` response.
    #[must_use]
    pub fn json(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "application/json")
            .with_body(body.into())
    }

    /// Adds a header. A value that is not valid header text is dropped.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => debug!(header = %name, "dropping unrepresentable header value"),
        }
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns a header value as text, if present and representable.
    #[must_use]
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
