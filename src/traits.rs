//! Extension traits for history sources and taggers.
//!
//! History Digest has two seams where behavior is pluggable:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             SourceRegistry               │
//! │  ┌──────────┐ ┌────────┐ ┌────────────┐  │
//! │  │ Chromium │ │ Safari │ │  Firefox   │  │
//! │  │Brave/Chr.│ │        │ │            │  │
//! │  └──────────┘ └────────┘ └────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     reader::read_source() → timeline
//!
//!     classify::Classifier ──▶ Option<Box<dyn Tagger>>
//! ```
//!
//! A [`HistorySource`] only describes *where* a store lives, *how* it encodes
//! time, and *which* SQL selects recent visits. Snapshotting, timestamp
//! normalization, and error recovery live in [`crate::reader`] and are shared
//! by every source.
//!
//! A [`Tagger`] contributes extra tags during classification. The built-in
//! implementation runs a Lua script ([`crate::tagger::LuaTagger`]).

use async_trait::async_trait;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::Browser;
use crate::timestamp::{NativeTime, TimeEncoding};

// ═══════════════════════════════════════════════════════════════════════
// HistorySource Trait
// ═══════════════════════════════════════════════════════════════════════

/// One row as selected from a history store, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVisit {
    pub url: Option<String>,
    pub title: Option<String>,
    pub visited: Option<NativeTime>,
}

/// A browser history store.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use history_digest::models::Browser;
/// use history_digest::timestamp::{NativeTime, TimeEncoding};
/// use history_digest::traits::{HistorySource, RawVisit};
/// use sqlx::SqliteConnection;
/// use std::path::PathBuf;
///
/// struct FixedChrome(PathBuf);
///
/// #[async_trait]
/// impl HistorySource for FixedChrome {
///     fn browser(&self) -> Browser { Browser::Chrome }
///     fn description(&self) -> &str { "Chrome history at a fixed path" }
///     fn resolve_path(&self) -> Option<PathBuf> { Some(self.0.clone()) }
///     fn encoding(&self) -> TimeEncoding { TimeEncoding::WebkitMicros }
///
///     async fn query(
///         &self,
///         _conn: &mut SqliteConnection,
///         _cutoff: NativeTime,
///     ) -> Result<Vec<RawVisit>, sqlx::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Which browser produced the store.
    fn browser(&self) -> Browser;

    /// One-line description, shown by `hdigest sources`.
    fn description(&self) -> &str;

    /// Location of the live database, if one can be determined.
    ///
    /// The path may not exist; the reader treats that as "browser not
    /// installed" rather than an error.
    fn resolve_path(&self) -> Option<PathBuf>;

    /// How visit times are stored.
    fn encoding(&self) -> TimeEncoding;

    /// Select visits strictly newer than `cutoff`.
    ///
    /// `conn` is a read-only connection to a private snapshot of the store.
    /// `cutoff` is already expressed in [`encoding`](HistorySource::encoding)
    /// units.
    async fn query(
        &self,
        conn: &mut SqliteConnection,
        cutoff: NativeTime,
    ) -> Result<Vec<RawVisit>, sqlx::Error>;
}

/// Ordered collection of history sources.
///
/// Sources are read in registration order; that order also decides how
/// visits with identical timestamps are ordered in the merged timeline.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn HistorySource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Box<dyn HistorySource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Box<dyn HistorySource>] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tagger Trait
// ═══════════════════════════════════════════════════════════════════════

/// External tagging hook consulted by the classifier.
///
/// Receives the raw (not lower-cased) text and URL plus a context map that
/// is currently always empty. Errors are absorbed by the classifier and
/// treated as "no extra tags".
pub trait Tagger: Send + Sync {
    fn name(&self) -> &str;

    fn tags(
        &self,
        text: &str,
        url: &str,
        context: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<String>>;
}
