//! Built-in history sources and their on-disk locations.
//!
//! | Source | Schema | Encoding |
//! |--------|--------|----------|
//! | Brave, Chrome | `urls(url, title, last_visit_time)` | `webkit-micros` |
//! | Safari | `history_items ⋈ history_visits` | `unix-seconds` |
//! | Firefox | `moz_places(url, title, last_visit_date)` | `unix-micros` |
//!
//! Paths default to each browser's standard profile location for the
//! current platform and can be overridden per source in the config.

use anyhow::Result;
use async_trait::async_trait;
use globset::Glob;
use sqlx::{Row, SqliteConnection};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{expand_home, Config, FirefoxSourceConfig, SourceConfig};
use crate::models::Browser;
use crate::timestamp::{NativeTime, TimeEncoding};
use crate::traits::{HistorySource, RawVisit, SourceRegistry};

const CHROMIUM_QUERY: &str = "SELECT url, title, last_visit_time \
     FROM urls WHERE last_visit_time > ?";

const SAFARI_QUERY: &str = "SELECT history_items.url, history_visits.title, history_visits.visit_time \
     FROM history_items \
     JOIN history_visits ON history_items.id = history_visits.history_item \
     WHERE history_visits.visit_time > ?";

const FIREFOX_QUERY: &str = "SELECT url, title, last_visit_date \
     FROM moz_places WHERE last_visit_date > ?";

// ═══════════════════════════════════════════════════════════════════════
// Chromium family (Chrome, Brave)
// ═══════════════════════════════════════════════════════════════════════

/// Chrome-style `History` database. Shared by every Chromium browser.
pub struct ChromiumSource {
    browser: Browser,
    path: Option<PathBuf>,
    encoding: TimeEncoding,
}

impl ChromiumSource {
    pub fn new(browser: Browser, config: &SourceConfig) -> Self {
        Self {
            browser,
            path: config
                .path
                .as_deref()
                .map(expand_home)
                .or_else(|| default_history_path(browser)),
            encoding: config.encoding.unwrap_or(TimeEncoding::WebkitMicros),
        }
    }
}

#[async_trait]
impl HistorySource for ChromiumSource {
    fn browser(&self) -> Browser {
        self.browser
    }

    fn description(&self) -> &str {
        "Chromium History database (urls table)"
    }

    fn resolve_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn encoding(&self) -> TimeEncoding {
        self.encoding
    }

    async fn query(
        &self,
        conn: &mut SqliteConnection,
        cutoff: NativeTime,
    ) -> Result<Vec<RawVisit>, sqlx::Error> {
        fetch_visits(conn, CHROMIUM_QUERY, cutoff, self.encoding).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Safari
// ═══════════════════════════════════════════════════════════════════════

pub struct SafariSource {
    path: Option<PathBuf>,
    encoding: TimeEncoding,
}

impl SafariSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            path: config
                .path
                .as_deref()
                .map(expand_home)
                .or_else(|| default_history_path(Browser::Safari)),
            encoding: config.encoding.unwrap_or(TimeEncoding::UnixSeconds),
        }
    }
}

#[async_trait]
impl HistorySource for SafariSource {
    fn browser(&self) -> Browser {
        Browser::Safari
    }

    fn description(&self) -> &str {
        "Safari History.db (history_items joined with history_visits)"
    }

    fn resolve_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn encoding(&self) -> TimeEncoding {
        self.encoding
    }

    async fn query(
        &self,
        conn: &mut SqliteConnection,
        cutoff: NativeTime,
    ) -> Result<Vec<RawVisit>, sqlx::Error> {
        fetch_visits(conn, SAFARI_QUERY, cutoff, self.encoding).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Firefox
// ═══════════════════════════════════════════════════════════════════════

pub struct FirefoxSource {
    config: FirefoxSourceConfig,
    encoding: TimeEncoding,
}

impl FirefoxSource {
    pub fn new(config: &FirefoxSourceConfig) -> Self {
        Self {
            config: config.clone(),
            encoding: config.encoding.unwrap_or(TimeEncoding::UnixMicros),
        }
    }
}

#[async_trait]
impl HistorySource for FirefoxSource {
    fn browser(&self) -> Browser {
        Browser::Firefox
    }

    fn description(&self) -> &str {
        "Firefox places.sqlite (moz_places table)"
    }

    fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.path {
            return Some(expand_home(path));
        }
        let profiles_dir = self
            .config
            .profiles_dir
            .as_deref()
            .map(expand_home)
            .or_else(default_firefox_profiles_dir)?;
        find_firefox_places(&profiles_dir, &self.config.profile_glob)
    }

    fn encoding(&self) -> TimeEncoding {
        self.encoding
    }

    async fn query(
        &self,
        conn: &mut SqliteConnection,
        cutoff: NativeTime,
    ) -> Result<Vec<RawVisit>, sqlx::Error> {
        fetch_visits(conn, FIREFOX_QUERY, cutoff, self.encoding).await
    }
}

/// Find `places.sqlite` in the first profile directory matching `pattern`.
///
/// Profiles are visited in file-name order so the choice is stable across
/// runs. Profiles without a `places.sqlite` are skipped.
pub fn find_firefox_places(profiles_dir: &Path, pattern: &str) -> Option<PathBuf> {
    let matcher = match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid firefox profile glob");
            return None;
        }
    };

    WalkDir::new(profiles_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.path().join("places.sqlite"))
        .find(|places| places.exists())
}

// ═══════════════════════════════════════════════════════════════════════
// Shared query helper
// ═══════════════════════════════════════════════════════════════════════

/// Run a `(url, title, timestamp)` query with a single cutoff parameter.
async fn fetch_visits(
    conn: &mut SqliteConnection,
    sql: &str,
    cutoff: NativeTime,
    encoding: TimeEncoding,
) -> Result<Vec<RawVisit>, sqlx::Error> {
    let query = sqlx::query(sql);
    let query = match cutoff {
        NativeTime::Integer(v) => query.bind(v),
        NativeTime::Real(v) => query.bind(v),
    };
    let rows = query.fetch_all(&mut *conn).await?;

    // Browser schemas are not under our control and SQLite is dynamically
    // typed, so decode without declared-type checks.
    let visits = rows
        .iter()
        .map(|row| {
            let visited = if encoding.is_real() {
                row.try_get_unchecked::<Option<f64>, _>(2)
                    .ok()
                    .flatten()
                    .map(NativeTime::Real)
            } else {
                row.try_get_unchecked::<Option<i64>, _>(2)
                    .ok()
                    .flatten()
                    .map(NativeTime::Integer)
            };
            RawVisit {
                url: row.try_get_unchecked::<Option<String>, _>(0).ok().flatten(),
                title: row.try_get_unchecked::<Option<String>, _>(1).ok().flatten(),
                visited,
            }
        })
        .collect();

    Ok(visits)
}

// ═══════════════════════════════════════════════════════════════════════
// Default locations
// ═══════════════════════════════════════════════════════════════════════

/// Standard history database location for a browser on this platform.
///
/// Firefox is not covered here; its database lives inside a profile
/// directory, see [`default_firefox_profiles_dir`].
pub fn default_history_path(browser: Browser) -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        let home = dirs::home_dir()?;
        let relative = match browser {
            Browser::Chrome => "Library/Application Support/Google/Chrome/Default/History",
            Browser::Brave => {
                "Library/Application Support/BraveSoftware/Brave-Browser/Default/History"
            }
            Browser::Safari => "Library/Safari/History.db",
            Browser::Firefox => return None,
        };
        Some(home.join(relative))
    } else if cfg!(target_os = "windows") {
        let local = dirs::data_local_dir()?;
        let relative = match browser {
            Browser::Chrome => "Google/Chrome/User Data/Default/History",
            Browser::Brave => "BraveSoftware/Brave-Browser/User Data/Default/History",
            Browser::Safari | Browser::Firefox => return None,
        };
        Some(local.join(relative))
    } else {
        let config = dirs::config_dir()?;
        let relative = match browser {
            Browser::Chrome => "google-chrome/Default/History",
            Browser::Brave => "BraveSoftware/Brave-Browser/Default/History",
            Browser::Safari | Browser::Firefox => return None,
        };
        Some(config.join(relative))
    }
}

/// Directory holding Firefox profiles on this platform.
pub fn default_firefox_profiles_dir() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(dirs::home_dir()?.join("Library/Application Support/Firefox/Profiles"))
    } else if cfg!(target_os = "windows") {
        Some(dirs::data_dir()?.join("Mozilla/Firefox/Profiles"))
    } else {
        Some(dirs::home_dir()?.join(".mozilla/firefox"))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry construction and listing
// ═══════════════════════════════════════════════════════════════════════

/// Build the registry of enabled sources, in the fixed read order
/// Brave, Chrome, Safari, Firefox.
pub fn build_registry(config: &Config) -> SourceRegistry {
    let sources = &config.sources;
    let mut registry = SourceRegistry::new();

    if sources.brave.enabled {
        registry.register(Box::new(ChromiumSource::new(Browser::Brave, &sources.brave)));
    }
    if sources.chrome.enabled {
        registry.register(Box::new(ChromiumSource::new(
            Browser::Chrome,
            &sources.chrome,
        )));
    }
    if sources.safari.enabled {
        registry.register(Box::new(SafariSource::new(&sources.safari)));
    }
    if sources.firefox.enabled {
        registry.register(Box::new(FirefoxSource::new(&sources.firefox)));
    }

    registry
}

/// Print every source, whether its store was found, and where.
pub fn list_sources(config: &Config) -> Result<()> {
    let registry = build_registry(config);

    println!("{:<10} {:<16} {:<15} PATH", "SOURCE", "STATUS", "ENCODING");
    for browser in Browser::ALL {
        let Some(source) = registry.sources().iter().find(|s| s.browser() == browser) else {
            println!("{:<10} {:<16} {:<15} -", browser.key(), "DISABLED", "-");
            continue;
        };

        let (status, path) = match source.resolve_path() {
            Some(path) if path.exists() => ("OK", path.display().to_string()),
            Some(path) => ("NOT FOUND", path.display().to_string()),
            None => ("NOT CONFIGURED", "-".to_string()),
        };
        println!(
            "{:<10} {:<16} {:<15} {}",
            browser.key(),
            status,
            source.encoding().to_string(),
            path
        );
    }

    Ok(())
}
