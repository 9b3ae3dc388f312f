//! OPML subscription-list rewriting.

use crate::error::RewriteResult;
use crate::xml::{XmlDocument, XmlElement};
use feedgate_codec::{Codec, ContentOption};
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// Rewrites every outline in an OPML document so its feed and site URLs
/// route through the gateway.
///
/// `xmlUrl` attributes take the codec's full encoding (feed URLs end up
/// in podcast clients with hard length limits); `htmlUrl` attributes use
/// the inline form. Outlines without a parseable absolute URL are left
/// alone.
///
/// # Errors
///
/// Returns [`crate::RewriteError::ParseFailure`] if the input is not
/// well-formed XML.
pub async fn rewrite_opml(xml: &str, codec: &Codec) -> RewriteResult<String> {
    let mut document = XmlDocument::parse(xml)?;
    rewrite_outlines(&mut document.root, codec).await;
    document.serialize()
}

// Outlines nest arbitrarily, so the walk recurses through a boxed
// future.
fn rewrite_outlines<'a>(
    element: &'a mut XmlElement,
    codec: &'a Codec,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if element.name == "outline" {
            if let Some(target) = parse_attr_url(element, "xmlUrl") {
                let encoded = codec.encode(&target, ContentOption::Feed).await;
                element.set_attr("xmlUrl", encoded.as_str());
            }
            if let Some(target) = parse_attr_url(element, "htmlUrl") {
                let encoded = codec.encode_inline(&target, ContentOption::Auto);
                element.set_attr("htmlUrl", encoded.as_str());
            }
        }
        for child in element.elements_mut() {
            rewrite_outlines(child, codec).await;
        }
    })
}

fn parse_attr_url(element: &XmlElement, name: &str) -> Option<Url> {
    Url::parse(element.attr(name)?.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RewriteError;

    const BASE: &str = "https://gate.example.com/proxy/";

    const OPML: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<opml version=\"2.0\">\n",
        "<head><title>Subscriptions</title></head>\n",
        "<body>\n",
        "<outline text=\"News\">\n",
        "<outline text=\"Example\" type=\"rss\" ",
        "xmlUrl=\"https://example.com/feed.xml\" htmlUrl=\"https://example.com/\"/>\n",
        "</outline>\n",
        "<outline text=\"Broken\" type=\"rss\" xmlUrl=\"not a url\"/>\n",
        "</body>\n",
        "</opml>\n",
    );

    fn codec() -> Codec {
        Codec::new(Url::parse(BASE).unwrap(), "key-123", false)
    }

    #[tokio::test]
    async fn nested_outline_urls_route_through_the_gateway() {
        let codec = codec();
        let output = rewrite_opml(OPML, &codec).await.unwrap();
        let document = XmlDocument::parse(&output).unwrap();

        let body = document.root.child("body").unwrap();
        let group = body.children_named("outline").next().unwrap();
        let leaf = group.children_named("outline").next().unwrap();

        let xml_url = leaf.attr("xmlUrl").unwrap();
        assert!(xml_url.starts_with(BASE));
        assert!(xml_url.contains("option=feed"));

        let html_url = leaf.attr("htmlUrl").unwrap();
        assert!(html_url.starts_with(BASE));
        assert!(html_url.contains("option=auto"));

        assert_eq!(leaf.attr("text"), Some("Example"));
    }

    #[tokio::test]
    async fn rewritten_feed_urls_decode_back() {
        let codec = codec();
        let output = rewrite_opml(OPML, &codec).await.unwrap();
        let document = XmlDocument::parse(&output).unwrap();

        let body = document.root.child("body").unwrap();
        let leaf = body
            .children_named("outline")
            .next()
            .unwrap()
            .children_named("outline")
            .next()
            .unwrap();
        let proxied = Url::parse(leaf.attr("xmlUrl").unwrap()).unwrap();
        let decoded = codec.decode(&proxied).await.unwrap();
        assert_eq!(decoded.as_str(), "https://example.com/feed.xml");
    }

    #[tokio::test]
    async fn unparseable_urls_and_head_are_untouched() {
        let codec = codec();
        let output = rewrite_opml(OPML, &codec).await.unwrap();
        let document = XmlDocument::parse(&output).unwrap();

        let head = document.root.child("head").unwrap();
        assert_eq!(
            head.child("title").unwrap().text_value().unwrap(),
            "Subscriptions"
        );

        let body = document.root.child("body").unwrap();
        let broken = body
            .children_named("outline")
            .find(|outline| outline.attr("text") == Some("Broken"))
            .unwrap();
        assert_eq!(broken.attr("xmlUrl"), Some("not a url"));
    }

    #[tokio::test]
    async fn malformed_opml_is_a_parse_failure() {
        let codec = codec();
        let result = rewrite_opml("<opml><body>", &codec).await;
        assert!(matches!(result, Err(RewriteError::ParseFailure(_))));
    }
}
