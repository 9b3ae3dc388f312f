//! # Feedgate Testkit
//!
//! Test utilities for feedgate.
//!
//! This crate provides:
//! - A fully assembled test gateway over a scriptable upstream
//! - Generated feed and OPML documents
//! - Property-based generators for URLs, options, and wrapped enclosures
//! - Cross-crate integration helpers and backend conformance checks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feedgate_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn rewrites_my_feed() {
//!     let gateway = TestGateway::memory();
//!     gateway.upstream.route_feed("https://pod.example/", &feed_with_items(5));
//!     let proxied = submit_url(&gateway, "https://pod.example/feed.xml", "feed").await;
//!     // ... drive the gateway
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
