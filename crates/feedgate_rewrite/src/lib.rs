//! # Feedgate Rewrite
//!
//! Document rewriting for feedgate: RSS 2.0 and Atom feeds, OPML
//! subscription lists, and the HTML fragments embedded inside them.
//!
//! Every externally reachable URL in a document is rewritten into a proxy
//! URL by the codec, so a client that can only speak to the gateway can
//! still follow links, fetch enclosures, and load images. Along the way
//! the rewriter prunes stale and excess entries and removes constructs
//! that confuse old feed readers.
//!
//! ## Design Principles
//!
//! - A document either parses or the whole operation fails; a truncated
//!   or garbled feed is worse than an error page
//! - A field whose value does not parse as an absolute URL is left alone
//! - Pruning happens before rewriting, so dropped entries cost nothing
//! - The HTML pass is a streaming transform; it never builds a DOM
//!
//! ## Example
//!
//! ```
//! use feedgate_codec::Codec;
//! use feedgate_rewrite::FeedRewriter;
//! use url::Url;
//!
//! # async fn demo() -> feedgate_rewrite::RewriteResult<()> {
//! let base = Url::parse("https://gate.example.com/proxy/").unwrap();
//! let codec = Codec::new(base, "caller-key", false);
//! let rewriter = FeedRewriter::new(&codec, 30);
//!
//! let feed = r#"<rss version="2.0"><channel><title>demo</title></channel></rss>"#;
//! let rewritten = rewriter.rewrite(feed).await?;
//! assert!(rewritten.contains("demo"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod html;
mod opml;
mod rewrite;
mod xml;

pub use error::{RewriteError, RewriteResult};
pub use html::rewrite_html;
pub use opml::rewrite_opml;
pub use rewrite::{FeedRewriter, DEFAULT_ATOM_RETENTION_DAYS, DEFAULT_RSS_RETENTION_DAYS};
pub use xml::{XmlDocument, XmlElement, XmlNode, XmlText};
