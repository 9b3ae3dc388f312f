//! Tracker-wrapper stripping.

use tracing::{debug, warn};
use url::Url;

/// A wrapper that encodes the real URL as leading path segments instead of
/// embedding it whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathWrapperRule {
    /// Substring matched against the wrapped URL's host.
    pub host_marker: String,
    /// Number of leading `/`-separated segments of the URL string to drop
    /// (scheme and host count as segments here, matching how the wrappers
    /// are laid out).
    pub skip_segments: usize,
}

/// The tracker-stripping rule set.
///
/// All three lists are hand-maintained configuration, not logic; the
/// defaults carry the known wrappers. A tracker match with no hosting
/// marker is logged so new markers can be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripRules {
    /// Ad/analytics domains known to wrap real hosting URLs.
    pub trackers: Vec<String>,
    /// Safe hosting domains that anchor where a wrapper ends.
    pub hosting_markers: Vec<String>,
    /// Wrappers that use path segments rather than an embedded URL.
    pub path_wrappers: Vec<PathWrapperRule>,
}

impl Default for StripRules {
    fn default() -> Self {
        Self {
            trackers: [
                "podtrac.com",
                "swap.fm",
                "pscrb.fm",
                "advenn.com",
                "chrt.fm",
            ]
            .map(String::from)
            .to_vec(),
            hosting_markers: [
                "stitcher.simplecastaudio.com",
                "traffic.libsyn.com",
                "traffic.megaphone.fm",
                "api.spreaker.com",
                "traffic.omny.fm",
                "www.omnycontent.com",
                "waaa.wnyc.org",
                "media.transistor.fm",
            ]
            .map(String::from)
            .to_vec(),
            path_wrappers: vec![PathWrapperRule {
                host_marker: "media.blubrry.com".to_string(),
                skip_segments: 4,
            }],
        }
    }
}

impl StripRules {
    /// Rules that strip nothing. Useful in tests.
    #[must_use]
    pub fn none() -> Self {
        Self {
            trackers: Vec::new(),
            hosting_markers: Vec::new(),
            path_wrappers: Vec::new(),
        }
    }

    /// Removes known tracker wrappers from `url`.
    ///
    /// If the URL text contains a tracker domain, everything before the
    /// first hosting marker and everything from the first `?` on is
    /// discarded, and the remainder becomes an `https` URL. A tracker
    /// match without any hosting marker passes through unchanged, with a
    /// warning naming the tracker so the marker list can grow. Path-segment
    /// wrappers drop a fixed number of leading segments instead.
    ///
    /// The operation is idempotent: stripping a stripped URL is a no-op.
    #[must_use]
    pub fn strip(&self, url: &Url) -> Url {
        let url_string = url.as_str();

        if let Some(tracker) = self.trackers.iter().find(|t| url_string.contains(t.as_str())) {
            let marker = self
                .hosting_markers
                .iter()
                .find(|m| url_string.contains(m.as_str()));

            match marker.and_then(|m| url_string.find(m.as_str())) {
                Some(start) => {
                    let clean = url_string[start..]
                        .split('?')
                        .next()
                        .unwrap_or(&url_string[start..]);
                    if let Ok(stripped) = Url::parse(&format!("https://{clean}")) {
                        debug!(tracker, target = %stripped, "stripped tracker wrapper");
                        return stripped;
                    }
                    warn!(tracker, url = url_string, "stripped remainder did not parse");
                    return url.clone();
                }
                None => {
                    warn!(
                        tracker,
                        url = url_string,
                        "tracker matched but no hosting marker found"
                    );
                    return url.clone();
                }
            }
        }

        for rule in &self.path_wrappers {
            let host_matches = url
                .host_str()
                .is_some_and(|h| h.contains(rule.host_marker.as_str()));
            if !host_matches {
                continue;
            }

            let without_query = url_string.split('?').next().unwrap_or(url_string);
            let segments: Vec<&str> = without_query.split('/').collect();
            if segments.len() > rule.skip_segments {
                let clean = segments[rule.skip_segments..].join("/");
                match Url::parse(&format!("https://{clean}")) {
                    Ok(stripped) => {
                        debug!(host = %rule.host_marker, target = %stripped, "stripped path wrapper");
                        return stripped;
                    }
                    Err(_) => {
                        warn!(
                            host = %rule.host_marker,
                            url = url_string,
                            "path wrapper remainder did not parse"
                        );
                    }
                }
            }
            return url.clone();
        }

        url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(input: &str) -> Url {
        StripRules::default().strip(&Url::parse(input).unwrap())
    }

    #[test]
    fn strips_podtrac_wrapper_to_hosting_url() {
        let stripped = strip(
            "https://dts.podtrac.com/redirect.mp3/traffic.libsyn.com/secure/show/foo.mp3?x=1",
        );
        assert_eq!(
            stripped.as_str(),
            "https://traffic.libsyn.com/secure/show/foo.mp3"
        );
    }

    #[test]
    fn strips_chained_wrappers_in_one_pass() {
        let stripped = strip(
            "https://chrt.fm/track/ABC123/dts.podtrac.com/redirect.mp3/traffic.megaphone.fm/XYZ.mp3?updated=1",
        );
        assert_eq!(stripped.as_str(), "https://traffic.megaphone.fm/XYZ.mp3");
    }

    #[test]
    fn tracker_without_marker_passes_through() {
        let url = "https://dts.podtrac.com/redirect.mp3/cdn.example.com/foo.mp3";
        assert_eq!(strip(url).as_str(), url);
    }

    #[test]
    fn unwrapped_url_passes_through() {
        let url = "https://traffic.libsyn.com/secure/show/foo.mp3";
        assert_eq!(strip(url).as_str(), url);
    }

    #[test]
    fn strips_blubrry_path_segments() {
        // String segments: ["https:", "", "media.blubrry.com", "show", rest...]
        let stripped =
            strip("https://media.blubrry.com/the_show/content.example.com/path/episode.mp3?t=9");
        assert_eq!(
            stripped.as_str(),
            "https://content.example.com/path/episode.mp3"
        );
    }

    #[test]
    fn short_blubrry_url_passes_through() {
        let url = "https://media.blubrry.com/episode.mp3";
        assert_eq!(strip(url).as_str(), url);
    }

    #[test]
    fn query_is_discarded_with_the_wrapper() {
        let stripped =
            strip("https://pscrb.fm/rss/p/traffic.omny.fm/d/clips/abc/episode.mp3?in_playlist=1&utm=podcast");
        assert_eq!(
            stripped.as_str(),
            "https://traffic.omny.fm/d/clips/abc/episode.mp3"
        );
    }

    #[test]
    fn stripping_is_idempotent() {
        let inputs = [
            "https://dts.podtrac.com/redirect.mp3/traffic.libsyn.com/secure/show/foo.mp3?x=1",
            "https://media.blubrry.com/the_show/content.example.com/path/episode.mp3",
            "https://traffic.libsyn.com/plain/episode.mp3",
            "https://example.com/unrelated.mp3?q=1",
        ];
        let rules = StripRules::default();
        for input in inputs {
            let once = rules.strip(&Url::parse(input).unwrap());
            let twice = rules.strip(&once);
            assert_eq!(once, twice, "stripping {input} twice diverged");
        }
    }

    #[test]
    fn empty_rules_strip_nothing() {
        let rules = StripRules::none();
        let url =
            Url::parse("https://dts.podtrac.com/redirect.mp3/traffic.libsyn.com/foo.mp3").unwrap();
        assert_eq!(rules.strip(&url), url);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn tracker() -> impl Strategy<Value = &'static str> {
            prop::sample::select(vec![
                "podtrac.com",
                "swap.fm",
                "pscrb.fm",
                "advenn.com",
                "chrt.fm",
            ])
        }

        fn marker() -> impl Strategy<Value = &'static str> {
            prop::sample::select(vec![
                "traffic.libsyn.com",
                "traffic.megaphone.fm",
                "api.spreaker.com",
                "media.transistor.fm",
            ])
        }

        proptest! {
            #[test]
            fn strip_is_idempotent_over_wrapped_urls(
                tracker in tracker(),
                marker in marker(),
                path in "[a-z0-9/]{0,40}",
                query in prop::option::of("[a-z0-9=&]{0,20}"),
            ) {
                let mut raw = format!("https://dts.{tracker}/wrap/{marker}/{path}");
                if let Some(query) = query {
                    raw.push('?');
                    raw.push_str(&query);
                }
                let Ok(url) = Url::parse(&raw) else {
                    return Ok(());
                };

                let rules = StripRules::default();
                let once = rules.strip(&url);
                let twice = rules.strip(&once);
                prop_assert_eq!(once, twice);
            }
        }
    }
}
