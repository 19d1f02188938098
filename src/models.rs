//! Core data models used throughout History Digest.
//!
//! These types represent the visits, search queries, and classified entries
//! that flow through the read → merge → classify → render pipeline. All of
//! them are plain values; each stage produces new values instead of mutating
//! its input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The browser application that recorded a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Brave,
    Chrome,
    Safari,
    Firefox,
}

impl Browser {
    /// All supported browsers, in the order their histories are read.
    pub const ALL: [Browser; 4] = [
        Browser::Brave,
        Browser::Chrome,
        Browser::Safari,
        Browser::Firefox,
    ];

    /// Lowercase identifier used in config sections and log fields.
    pub fn key(&self) -> &'static str {
        match self {
            Browser::Brave => "brave",
            Browser::Chrome => "chrome",
            Browser::Safari => "safari",
            Browser::Firefox => "firefox",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Browser::Brave => "Brave",
            Browser::Chrome => "Chrome",
            Browser::Safari => "Safari",
            Browser::Firefox => "Firefox",
        };
        f.write_str(name)
    }
}

/// One browsing event, normalized from a single history row.
///
/// `title` may be empty. Renderers must show an explicit placeholder for it
/// rather than treat it as missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub source: Browser,
    pub url: String,
    pub title: String,
    pub visit_time: DateTime<Utc>,
}

/// A search (or video watch) recovered from a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    /// Recognizer name, e.g. `"google"` or `"youtube"`.
    pub engine: String,
    /// Percent- and plus-decoded query term.
    pub query: String,
}

/// A [`HistoryEntry`] with its topic, tags, and recovered search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedEntry {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub topic: String,
    /// Sorted and duplicate-free.
    pub tags: Vec<String>,
    pub search: Option<SearchQuery>,
}
