//! Property-based generators for URLs, options, and wrapped enclosures.
//!
//! Strategies here feed the token and stripping properties: any URL a
//! strategy yields must survive an encode/decode round trip, and
//! stripping must be idempotent over both clean and tracker-wrapped
//! inputs.

use feedgate_codec::ContentOption;
use proptest::prelude::*;
use url::Url;

/// Strategy for plausible registrable host names.
pub fn host_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{2,10}\\.(com|net|org|fm|example)")
        .expect("host regex is valid")
}

/// Strategy for absolute http(s) URLs with a few path segments and an
/// optional query.
pub fn absolute_url_strategy() -> impl Strategy<Value = Url> {
    (
        prop::bool::ANY,
        host_strategy(),
        prop::collection::vec(
            prop::string::string_regex("[a-z0-9_-]{1,12}(\\.[a-z0-9]{1,4})?")
                .expect("segment regex is valid"),
            0..4,
        ),
        prop::option::of(
            prop::string::string_regex("[a-z]{1,6}=[a-z0-9]{1,8}").expect("query regex is valid"),
        ),
    )
        .prop_map(|(https, host, segments, query)| {
            let scheme = if https { "https" } else { "http" };
            let mut raw = format!("{scheme}://{host}/");
            raw.push_str(&segments.join("/"));
            if let Some(query) = query {
                raw.push('?');
                raw.push_str(&query);
            }
            Url::parse(&raw).expect("generated URL is well formed")
        })
}

/// Strategy over every content option.
pub fn content_option_strategy() -> impl Strategy<Value = ContentOption> {
    prop_oneof![
        Just(ContentOption::Auto),
        Just(ContentOption::Feed),
        Just(ContentOption::Html),
        Just(ContentOption::Asset),
        Just(ContentOption::Image),
    ]
}

/// Strategy for enclosure URLs wrapped in a known tracker prefix, the
/// way podcast audio arrives in the wild.
pub fn tracker_wrapped_url_strategy() -> impl Strategy<Value = Url> {
    (
        prop_oneof![
            Just("dts.podtrac.com/redirect.mp3"),
            Just("chrt.fm/track/ABC123"),
        ],
        prop::string::string_regex("[a-z0-9_-]{1,16}").expect("episode regex is valid"),
    )
        .prop_map(|(wrapper, episode)| {
            Url::parse(&format!(
                "https://{wrapper}/traffic.libsyn.com/show/{episode}.mp3"
            ))
            .expect("wrapped URL is well formed")
        })
}
