//! RSS 2.0 and Atom feed rewriting.

use crate::error::RewriteResult;
use crate::html::rewrite_html;
use crate::xml::{XmlDocument, XmlElement};
use chrono::{DateTime, Duration, Utc};
use feedgate_codec::{Codec, ContentOption};
use tracing::{debug, warn};
use url::Url;

/// Days an RSS item is kept before it is pruned as stale.
pub const DEFAULT_RSS_RETENTION_DAYS: i64 = 365;

/// Days an Atom entry is kept before it is pruned as stale.
pub const DEFAULT_ATOM_RETENTION_DAYS: i64 = 30;

/// Fields that carry embedded HTML rather than a bare URL.
const HTML_BODY_FIELDS: [&str; 4] = ["description", "content:encoded", "content", "summary"];

/// Rewrites a feed document so every resource URL routes through the
/// gateway.
///
/// The rewriter walks the channel (RSS) or feed (Atom) tree, replaces
/// each recognized URL with a proxy URL from the codec, strips
/// constructs old readers choke on, and prunes stale and excess
/// entries. Enclosure-bearing fields go through the codec's full
/// encoding so legacy clients get short tokens; secondary links use the
/// inline form directly.
pub struct FeedRewriter<'a> {
    codec: &'a Codec,
    entry_cap: usize,
    rss_retention: Duration,
    atom_retention: Duration,
    reference_time: Option<DateTime<Utc>>,
}

impl<'a> FeedRewriter<'a> {
    /// Creates a rewriter that keeps at most `entry_cap` items per feed.
    #[must_use]
    pub fn new(codec: &'a Codec, entry_cap: usize) -> Self {
        Self {
            codec,
            entry_cap,
            rss_retention: Duration::days(DEFAULT_RSS_RETENTION_DAYS),
            atom_retention: Duration::days(DEFAULT_ATOM_RETENTION_DAYS),
            reference_time: None,
        }
    }

    /// Overrides the retention windows for RSS items and Atom entries.
    #[must_use]
    pub fn with_retention(mut self, rss: Duration, atom: Duration) -> Self {
        self.rss_retention = rss;
        self.atom_retention = atom;
        self
    }

    /// Pins the timestamp entries are aged against instead of the
    /// current time.
    #[must_use]
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    /// Rewrites `xml` and returns the serialized result.
    ///
    /// A document whose root is neither `rss` nor `feed` passes through
    /// with only the stylesheet instruction removed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RewriteError::ParseFailure`] if the input is not
    /// well-formed XML. A parse failure is terminal; the rewriter never
    /// emits a partially rewritten document.
    pub async fn rewrite(&self, xml: &str) -> RewriteResult<String> {
        let mut document = XmlDocument::parse(xml)?;
        let removed = document.remove_stylesheet_instructions();
        if removed > 0 {
            debug!(removed, "dropped xml-stylesheet instruction");
        }

        let now = self.reference_time.unwrap_or_else(Utc::now);
        match document.root.name.as_str() {
            "rss" => self.rewrite_rss(&mut document.root, now).await,
            "feed" => self.rewrite_atom(&mut document.root, now).await,
            other => {
                warn!(root = other, "document is not feed-shaped; passing through");
            }
        }

        document.serialize()
    }

    async fn rewrite_rss(&self, rss: &mut XmlElement, now: DateTime<Utc>) {
        let Some(channel) = rss.child_mut("channel") else {
            warn!("rss document has no channel; passing through");
            return;
        };

        channel.remove_children("itunes:new-feed-url");

        if let Some(image) = channel.child_mut("itunes:image") {
            self.rewrite_attr(image, "href", ContentOption::Image).await;
        }
        if let Some(link) = channel.child_mut("link") {
            self.rewrite_text(link, ContentOption::Auto).await;
        }
        for link in channel.children_named_mut("atom:link") {
            if link.attr("rel") == Some("self") {
                self.rewrite_attr_inline(link, "href", ContentOption::Feed);
            }
        }
        if let Some(image) = channel.child_mut("image") {
            if let Some(url) = image.child_mut("url") {
                self.rewrite_text_inline(url, ContentOption::Image);
            }
            if let Some(link) = image.child_mut("link") {
                self.rewrite_text_inline(link, ContentOption::Auto);
            }
        }

        let cutoff = now - self.rss_retention;
        let mut kept = 0usize;
        channel.prune_children("item", |item| {
            if kept >= self.entry_cap || !rss_item_is_fresh(item, cutoff) {
                return false;
            }
            kept += 1;
            true
        });

        for item in channel.children_named_mut("item") {
            self.rewrite_item(item).await;
        }
    }

    async fn rewrite_item(&self, item: &mut XmlElement) {
        if let Some(link) = item.child_mut("link") {
            self.rewrite_text_inline(link, ContentOption::Auto);
        }
        if let Some(image) = item.child_mut("itunes:image") {
            self.rewrite_attr(image, "href", ContentOption::Image).await;
        }
        if let Some(enclosure) = item.child_mut("enclosure") {
            self.rewrite_attr(enclosure, "url", ContentOption::Asset)
                .await;
        }
        if let Some(media) = item.child_mut("media:content") {
            self.rewrite_attr(media, "url", ContentOption::Asset).await;
        }
        for field in HTML_BODY_FIELDS {
            if let Some(body) = item.child_mut(field) {
                self.rewrite_html_body(body);
            }
        }
    }

    async fn rewrite_atom(&self, feed: &mut XmlElement, now: DateTime<Utc>) {
        for link in feed.children_named_mut("link") {
            self.rewrite_link_element(link);
        }
        if let Some(logo) = feed.child_mut("logo") {
            self.rewrite_text_inline(logo, ContentOption::Image);
        }
        if let Some(icon) = feed.child_mut("icon") {
            self.rewrite_text_inline(icon, ContentOption::Image);
        }

        let cutoff = now - self.atom_retention;
        let mut kept = 0usize;
        feed.prune_children("entry", |entry| {
            if kept >= self.entry_cap || !atom_entry_is_fresh(entry, cutoff) {
                return false;
            }
            kept += 1;
            true
        });

        for entry in feed.children_named_mut("entry") {
            for link in entry.children_named_mut("link") {
                self.rewrite_link_element(link);
            }
            for field in HTML_BODY_FIELDS {
                if let Some(body) = entry.child_mut(field) {
                    self.rewrite_html_body(body);
                }
            }
        }
    }

    /// Rewrites an Atom `link` element, inferring the content option
    /// from its `type` and `rel` attributes.
    fn rewrite_link_element(&self, link: &mut XmlElement) {
        let option = ContentOption::from_link_hint(link.attr("type"), link.attr("rel"));
        self.rewrite_attr_inline(link, "href", option);
    }

    async fn rewrite_attr(&self, element: &mut XmlElement, name: &str, option: ContentOption) {
        let Some(target) = parse_target(element.attr(name)) else {
            return;
        };
        let encoded = self.codec.encode(&target, option).await;
        element.set_attr(name, encoded.as_str());
    }

    fn rewrite_attr_inline(&self, element: &mut XmlElement, name: &str, option: ContentOption) {
        let Some(target) = parse_target(element.attr(name)) else {
            return;
        };
        let encoded = self.codec.encode_inline(&target, option);
        element.set_attr(name, encoded.as_str());
    }

    async fn rewrite_text(&self, element: &mut XmlElement, option: ContentOption) {
        let Some(target) = parse_target(element.text_value().as_deref()) else {
            return;
        };
        let encoded = self.codec.encode(&target, option).await;
        element.set_text_value(encoded.as_str());
    }

    fn rewrite_text_inline(&self, element: &mut XmlElement, option: ContentOption) {
        let Some(target) = parse_target(element.text_value().as_deref()) else {
            return;
        };
        let encoded = self.codec.encode_inline(&target, option);
        element.set_text_value(encoded.as_str());
    }

    fn rewrite_html_body(&self, element: &mut XmlElement) {
        let Some(body) = element.text_value() else {
            return;
        };
        if body.trim().is_empty() {
            return;
        }
        match rewrite_html(&body, self.codec) {
            Ok(rewritten) => element.set_text_value(&rewritten),
            Err(err) => {
                warn!(field = %element.name, error = %err, "html body rewrite failed; field left unchanged");
            }
        }
    }
}

/// A field value only counts as a rewrite target if it parses as an
/// absolute URL; anything else is left for the reader to interpret.
fn parse_target(raw: Option<&str>) -> Option<Url> {
    Url::parse(raw?.trim()).ok()
}

fn rss_item_is_fresh(item: &XmlElement, cutoff: DateTime<Utc>) -> bool {
    let Some(raw) = item.child("pubDate").and_then(XmlElement::text_value) else {
        return true;
    };
    match DateTime::parse_from_rfc2822(raw.trim()) {
        Ok(published) => published.with_timezone(&Utc) >= cutoff,
        // An unparseable date is not grounds for dropping the item.
        Err(_) => true,
    }
}

fn atom_entry_is_fresh(entry: &XmlElement, cutoff: DateTime<Utc>) -> bool {
    let raw = entry
        .child("updated")
        .and_then(XmlElement::text_value)
        .or_else(|| entry.child("published").and_then(XmlElement::text_value));
    let Some(raw) = raw else {
        return true;
    };
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(updated) => updated.with_timezone(&Utc) >= cutoff,
        Err(_) => true,
    }
}
