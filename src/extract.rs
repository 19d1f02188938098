//! Search intent extraction from URLs.
//!
//! A fixed, ordered list of recognizers is tried against each URL and the
//! first match wins:
//!
//! | Engine | Shape |
//! |--------|-------|
//! | `google` | `google.<tld>/search?…q=<query>` |
//! | `bing` | `bing.com/search?…q=<query>` |
//! | `duckduckgo` | `duckduckgo.com/?…q=<query>` |
//! | `youtube` | `youtube.com/watch?…v=<id>` or `youtu.be/<id>` |
//!
//! The captured value is percent- and `+`-decoded. A URL that matches
//! nothing is an ordinary visit, not an error.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::SearchQuery;

struct Recognizer {
    engine: &'static str,
    pattern: Regex,
}

static RECOGNIZERS: LazyLock<Vec<Recognizer>> = LazyLock::new(|| {
    [
        (
            "google",
            r"^https?://(?:[^/?#]*\.)?google\.[^/?#]+/search\?(?:[^#]*&)?q=(?P<q>[^&#]+)",
        ),
        (
            "bing",
            r"^https?://(?:[^/?#]*\.)?bing\.com/search\?(?:[^#]*&)?q=(?P<q>[^&#]+)",
        ),
        (
            "duckduckgo",
            r"^https?://(?:[^/?#]*\.)?duckduckgo\.com/\?(?:[^#]*&)?q=(?P<q>[^&#]+)",
        ),
        (
            "youtube",
            r"^https?://(?:(?:www\.|m\.)?youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/)(?P<q>[^&/?#]+)",
        ),
    ]
    .into_iter()
    .map(|(engine, pattern)| Recognizer {
        engine,
        pattern: Regex::new(pattern).expect("search recognizer pattern is valid"),
    })
    .collect()
});

/// Recover the `(engine, query)` pair from a search or video URL.
pub fn extract_search_query(url: &str) -> Option<SearchQuery> {
    RECOGNIZERS.iter().find_map(|recognizer| {
        let captures = recognizer.pattern.captures(url)?;
        let query = decode_query_value(captures.name("q")?.as_str());
        if query.trim().is_empty() {
            return None;
        }
        Some(SearchQuery {
            engine: recognizer.engine.to_string(),
            query,
        })
    })
}

/// Names of all recognizers, in matching order.
pub fn engines() -> Vec<&'static str> {
    RECOGNIZERS.iter().map(|r| r.engine).collect()
}

/// Decode a single `application/x-www-form-urlencoded` value.
fn decode_query_value(raw: &str) -> String {
    // The raw value never contains '&', so it parses as exactly one pair.
    let pair = format!("q={}", raw);
    url::form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(url: &str) -> Option<(String, String)> {
        extract_search_query(url).map(|sq| (sq.engine, sq.query))
    }

    fn pair(engine: &str, query: &str) -> Option<(String, String)> {
        Some((engine.to_string(), query.to_string()))
    }

    #[test]
    fn test_google_plus_decoding() {
        assert_eq!(
            extract("https://www.google.com/search?q=rust+ownership"),
            pair("google", "rust ownership")
        );
    }

    #[test]
    fn test_google_query_not_first_param() {
        assert_eq!(
            extract("https://www.google.co.uk/search?client=firefox&q=borrow%20checker&oq=x"),
            pair("google", "borrow checker")
        );
    }

    #[test]
    fn test_google_ignores_similar_params() {
        assert_eq!(extract("https://www.google.com/search?oq=partial"), None);
    }

    #[test]
    fn test_percent_decoding_utf8() {
        assert_eq!(
            extract("https://duckduckgo.com/?q=caf%C3%A9+near+me&ia=web"),
            pair("duckduckgo", "café near me")
        );
    }

    #[test]
    fn test_bing() {
        assert_eq!(
            extract("https://www.bing.com/search?form=QBLH&q=tokio%3A%3Aselect"),
            pair("bing", "tokio::select")
        );
    }

    #[test]
    fn test_bing_ignores_pq_param() {
        assert_eq!(extract("https://www.bing.com/search?pq=abc"), None);
    }

    #[test]
    fn test_youtube_watch_and_short_links() {
        assert_eq!(
            extract("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            pair("youtube", "dQw4w9WgXcQ")
        );
        assert_eq!(
            extract("https://youtu.be/dQw4w9WgXcQ?si=share"),
            pair("youtube", "dQw4w9WgXcQ")
        );
        assert_eq!(
            extract("https://m.youtube.com/watch?feature=share&v=abc123"),
            pair("youtube", "abc123")
        );
    }

    #[test]
    fn test_non_search_urls() {
        assert_eq!(extract("https://docs.rs/tokio"), None);
        assert_eq!(extract("https://www.google.com/maps?q=berlin"), None);
        assert_eq!(extract("not a url"), None);
        assert_eq!(extract(""), None);
    }

    #[test]
    fn test_first_recognizer_wins() {
        // Also looks like a youtube short link in the query, but the google
        // recognizer comes first.
        assert_eq!(
            extract("https://www.google.com/search?q=https://youtu.be/xyz"),
            pair("google", "https://youtu.be/xyz")
        );
    }

    #[test]
    fn test_host_must_be_engine_domain() {
        assert_eq!(
            extract("https://evil.example/redirect?to=google.com/search?q=x"),
            None
        );
    }

    #[test]
    fn test_deterministic() {
        let url = "https://www.google.com/search?q=a+b%2Bc";
        assert_eq!(extract(url), extract(url));
        assert_eq!(extract(url), pair("google", "a b+c"));
    }

    #[test]
    fn test_engine_order() {
        assert_eq!(engines(), vec!["google", "bing", "duckduckgo", "youtube"]);
    }
}
