//! Streaming HTML rewriting.
//!
//! Used both for HTML fragments embedded in feed fields and for whole
//! proxied pages. The transform never buffers a DOM; lol_html applies
//! the handlers as the document streams through.

use crate::error::{RewriteError, RewriteResult};
use feedgate_codec::{Codec, ContentOption};
use lol_html::html_content::Element;
use lol_html::{element, HandlerResult, HtmlRewriter, Settings};
use url::Url;

/// Widest srcset candidate a legacy renderer is handed.
const MAX_SRCSET_WIDTH: u32 = 1000;

/// Rewrites an HTML document or fragment so every resource URL routes
/// through the gateway.
///
/// Scripts are dropped, `noscript` wrappers are unwrapped, inline event
/// handlers are stripped, and `srcset`/`sizes` are collapsed into a
/// single `src` the client does not have to choose from. URLs that do
/// not parse as absolute are left alone.
///
/// # Errors
///
/// Returns [`RewriteError::HtmlRewrite`] if the streaming transform
/// rejects the input.
pub fn rewrite_html(html: &str, codec: &Codec) -> RewriteResult<String> {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("noscript", |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
                element!("*", |el| {
                    strip_event_handlers(el);
                    Ok(())
                }),
                element!("a", |el| {
                    rewrite_url_attribute(el, "href", ContentOption::Auto, codec)
                }),
                element!("img", |el| {
                    rewrite_media_source(el, ContentOption::Image, codec)
                }),
                element!("video", |el| {
                    rewrite_media_source(el, ContentOption::Asset, codec)
                }),
                element!("audio", |el| {
                    rewrite_media_source(el, ContentOption::Asset, codec)
                }),
                element!("source", |el| {
                    rewrite_media_source(el, ContentOption::Asset, codec)
                }),
                element!("link", |el| {
                    let stylesheet = el
                        .get_attribute("rel")
                        .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"));
                    if stylesheet {
                        rewrite_url_attribute(el, "href", ContentOption::Asset, codec)?;
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|err| RewriteError::HtmlRewrite(err.to_string()))?;
    rewriter
        .end()
        .map_err(|err| RewriteError::HtmlRewrite(err.to_string()))?;

    String::from_utf8(output).map_err(|err| RewriteError::HtmlRewrite(err.to_string()))
}

fn strip_event_handlers(el: &mut Element<'_, '_>) {
    let handlers: Vec<String> = el
        .attributes()
        .iter()
        .map(|attribute| attribute.name())
        .filter(|name| name.starts_with("on"))
        .collect();
    for name in handlers {
        el.remove_attribute(&name);
    }
}

fn rewrite_url_attribute(
    el: &mut Element<'_, '_>,
    name: &str,
    option: ContentOption,
    codec: &Codec,
) -> HandlerResult {
    let Some(raw) = el.get_attribute(name) else {
        return Ok(());
    };
    let Ok(target) = Url::parse(raw.trim()) else {
        return Ok(());
    };
    let encoded = codec.encode_inline(&target, option);
    el.set_attribute(name, encoded.as_str())?;
    Ok(())
}

/// Rewrites `src`, preferring a candidate picked out of `srcset` when
/// one is present, then drops `srcset` and `sizes` entirely.
fn rewrite_media_source(
    el: &mut Element<'_, '_>,
    option: ContentOption,
    codec: &Codec,
) -> HandlerResult {
    let chosen = el
        .get_attribute("srcset")
        .and_then(|srcset| pick_srcset_candidate(&srcset));
    let candidates = [chosen, el.get_attribute("src")];
    for raw in candidates.into_iter().flatten() {
        if let Ok(target) = Url::parse(raw.trim()) {
            let encoded = codec.encode_inline(&target, option);
            el.set_attribute("src", encoded.as_str())?;
            break;
        }
    }
    el.remove_attribute("srcset");
    el.remove_attribute("sizes");
    Ok(())
}

/// Picks the largest `url <width>w` candidate no wider than
/// [`MAX_SRCSET_WIDTH`], falling back to the first candidate when none
/// qualifies.
fn pick_srcset_candidate(srcset: &str) -> Option<String> {
    let mut first: Option<&str> = None;
    let mut best: Option<(u32, &str)> = None;
    for candidate in srcset.split(',') {
        let mut parts = candidate.split_whitespace();
        let Some(url) = parts.next() else {
            continue;
        };
        if first.is_none() {
            first = Some(url);
        }
        let Some(width) = parts
            .next()
            .and_then(|descriptor| descriptor.strip_suffix('w'))
            .and_then(|digits| digits.parse::<u32>().ok())
        else {
            continue;
        };
        if width <= MAX_SRCSET_WIDTH && best.is_none_or(|(so_far, _)| width > so_far) {
            best = Some((width, url));
        }
    }
    best.map(|(_, url)| url.to_string())
        .or_else(|| first.map(str::to_string))
}
