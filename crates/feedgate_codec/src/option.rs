//! Content kinds a proxied resource can be handled as.

use std::fmt;

/// How the gateway should treat a proxied resource.
///
/// Unknown or absent input always normalizes to [`ContentOption::Auto`];
/// a caller can never produce an invalid option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentOption {
    /// Kind not yet known; resolved by probing the target.
    #[default]
    Auto,
    /// An RSS/Atom document to rewrite.
    Feed,
    /// An HTML page to rewrite.
    Html,
    /// An opaque binary passed through as-is.
    Asset,
    /// An image to transcode for legacy decoders.
    Image,
}

impl ContentOption {
    /// Parses a request parameter, case-insensitively.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("feed") => Self::Feed,
            Some("html") => Self::Html,
            Some("asset") => Self::Asset,
            Some("image") => Self::Image,
            _ => Self::Auto,
        }
    }

    /// The wire form used in query strings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Feed => "feed",
            Self::Html => "html",
            Self::Asset => "asset",
            Self::Image => "image",
        }
    }

    /// Classifies an upstream `Content-Type` value.
    ///
    /// Used when an `auto` target has been probed.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("xml") || ct.contains("rss") || ct.contains("atom") {
            Self::Feed
        } else if ct.contains("html") {
            Self::Html
        } else if ct.contains("image") {
            Self::Image
        } else {
            Self::Asset
        }
    }

    /// Infers the kind of an Atom `<link>` from its `type` and `rel`
    /// attributes. `rel="self"` always means the feed itself.
    #[must_use]
    pub fn from_link_hint(link_type: Option<&str>, rel: Option<&str>) -> Self {
        if rel.is_some_and(|r| r.eq_ignore_ascii_case("self")) {
            return Self::Feed;
        }
        let Some(link_type) = link_type else {
            return Self::Auto;
        };
        let ty = link_type.to_ascii_lowercase();
        if ty.contains("html") {
            Self::Html
        } else if ty.contains("xml") || ty.contains("rss") || ty.contains("atom") {
            Self::Feed
        } else if ty.contains("audio") {
            Self::Asset
        } else if ty.contains("image") {
            Self::Image
        } else {
            Self::Auto
        }
    }
}

impl fmt::Display for ContentOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_options() {
        assert_eq!(ContentOption::parse(Some("feed")), ContentOption::Feed);
        assert_eq!(ContentOption::parse(Some("HTML")), ContentOption::Html);
        assert_eq!(ContentOption::parse(Some("Asset")), ContentOption::Asset);
        assert_eq!(ContentOption::parse(Some("image")), ContentOption::Image);
        assert_eq!(ContentOption::parse(Some("auto")), ContentOption::Auto);
    }

    #[test]
    fn parse_unknown_normalizes_to_auto() {
        assert_eq!(ContentOption::parse(None), ContentOption::Auto);
        assert_eq!(ContentOption::parse(Some("")), ContentOption::Auto);
        assert_eq!(ContentOption::parse(Some("video")), ContentOption::Auto);
        assert_eq!(ContentOption::parse(Some("FEEDS")), ContentOption::Auto);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for option in [
            ContentOption::Auto,
            ContentOption::Feed,
            ContentOption::Html,
            ContentOption::Asset,
            ContentOption::Image,
        ] {
            assert_eq!(ContentOption::parse(Some(option.as_str())), option);
        }
    }

    #[test]
    fn content_type_classification() {
        assert_eq!(
            ContentOption::from_content_type("application/rss+xml; charset=utf-8"),
            ContentOption::Feed
        );
        assert_eq!(
            ContentOption::from_content_type("application/atom+xml"),
            ContentOption::Feed
        );
        assert_eq!(
            ContentOption::from_content_type("text/xml"),
            ContentOption::Feed
        );
        assert_eq!(
            ContentOption::from_content_type("text/html; charset=utf-8"),
            ContentOption::Html
        );
        assert_eq!(
            ContentOption::from_content_type("image/png"),
            ContentOption::Image
        );
        assert_eq!(
            ContentOption::from_content_type("audio/mpeg"),
            ContentOption::Asset
        );
        assert_eq!(
            ContentOption::from_content_type("application/octet-stream"),
            ContentOption::Asset
        );
    }

    #[test]
    fn link_hints() {
        assert_eq!(
            ContentOption::from_link_hint(Some("text/html"), Some("alternate")),
            ContentOption::Html
        );
        assert_eq!(
            ContentOption::from_link_hint(Some("application/rss+xml"), None),
            ContentOption::Feed
        );
        assert_eq!(
            ContentOption::from_link_hint(Some("audio/mpeg"), Some("enclosure")),
            ContentOption::Asset
        );
        assert_eq!(
            ContentOption::from_link_hint(Some("image/jpeg"), None),
            ContentOption::Image
        );
        assert_eq!(
            ContentOption::from_link_hint(None, None),
            ContentOption::Auto
        );
    }

    #[test]
    fn rel_self_overrides_type() {
        assert_eq!(
            ContentOption::from_link_hint(Some("text/html"), Some("self")),
            ContentOption::Feed
        );
        assert_eq!(
            ContentOption::from_link_hint(None, Some("self")),
            ContentOption::Feed
        );
    }
}
