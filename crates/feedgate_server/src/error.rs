//! Gateway error taxonomy.

use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by gateway capabilities.
///
/// Every variant maps to exactly one response status. Boundary operations
/// that have a meaningful degraded outcome (codec decode, store get,
/// decrypt) return sentinel values instead of erroring; what reaches this
/// type is a failure the request cannot recover from.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or missing request parameters.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing or invalid caller key.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Unknown path, token, or stored entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target (or a collaborator service) could not be reached.
    #[error("upstream unreachable: {0}")]
    Upstream(String),

    /// Unexpected internal fault.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// The response status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors caused by the caller's request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Auth(_) | Self::NotFound(_)
        )
    }

    /// True for errors the caller cannot fix by changing the request.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// The body text sent to the caller.
    ///
    /// Internal faults keep their detail in the log and send a generic
    /// message; everything else is safe to echo.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<feedgate_rewrite::RewriteError> for GatewayError {
    fn from(err: feedgate_rewrite::RewriteError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<feedgate_store::StoreError> for GatewayError {
    fn from(err: feedgate_store::StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
