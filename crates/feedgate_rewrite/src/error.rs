//! Error types for document rewriting.

use thiserror::Error;

/// Errors that can occur while rewriting a document.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The input document is not well-formed XML.
    #[error("document parse failure: {0}")]
    ParseFailure(String),

    /// The rewritten tree could not be serialized back to text.
    #[error("document serialization failed: {0}")]
    Serialization(String),

    /// The streaming HTML transform rejected a fragment.
    #[error("html rewrite failed: {0}")]
    HtmlRewrite(String),
}

/// Result type for rewrite operations.
pub type RewriteResult<T> = Result<T, RewriteError>;
