//! Snapshot-and-query reader shared by every history source.
//!
//! For one [`HistorySource`] the reader:
//!
//! 1. resolves the store path (missing store → empty result),
//! 2. copies it aside with a [`Snapshot`] so the live file is never locked,
//! 3. opens the copy read-only and runs the source's query with the cutoff
//!    expressed in native units,
//! 4. normalizes each row into a [`HistoryEntry`], dropping rows without a
//!    usable URL or timestamp.
//!
//! Failures never escape [`read_source`]; an unreadable store simply
//! contributes nothing to the timeline.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::models::{Browser, HistoryEntry};
use crate::snapshot::Snapshot;
use crate::timestamp::TimeEncoding;
use crate::traits::{HistorySource, RawVisit};

/// Upper bound on how long SQLite may wait on a lock.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Read visits newer than `now - lookback_days` from one source.
///
/// Never fails: unavailable sources are logged and yield an empty vector.
pub async fn read_source(
    source: &dyn HistorySource,
    lookback_days: u32,
    now: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let browser = source.browser();
    match try_read_source(source, lookback_days, now).await {
        Ok(entries) => {
            info!(source = %browser, entries = entries.len(), "read history");
            entries
        }
        Err(SourceError::NotFound(path)) => {
            debug!(source = %browser, path = %path.display(), "no history store, skipping");
            Vec::new()
        }
        Err(e) => {
            warn!(source = %browser, error = %e, "history source unavailable, skipping");
            Vec::new()
        }
    }
}

/// Like [`read_source`], but reports why a source produced nothing.
pub async fn try_read_source(
    source: &dyn HistorySource,
    lookback_days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<HistoryEntry>, SourceError> {
    let Some(path) = source.resolve_path() else {
        debug!(source = %source.browser(), "no history path for this platform");
        return Ok(Vec::new());
    };
    if !path.exists() {
        return Err(SourceError::NotFound(path));
    }

    let snapshot = Snapshot::take(&path)?;

    let options = SqliteConnectOptions::new()
        .filename(snapshot.path())
        .read_only(true)
        .immutable(true)
        .busy_timeout(BUSY_TIMEOUT);
    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| SourceError::Open {
            path: path.clone(),
            source: e,
        })?;

    let encoding = source.encoding();
    // A window reaching past chrono's range means "everything".
    let since = now
        .checked_sub_signed(Duration::days(i64::from(lookback_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let cutoff = encoding.from_utc(since);
    let result = source.query(&mut conn, cutoff).await;

    if let Err(e) = conn.close().await {
        debug!(source = %source.browser(), error = %e, "error closing snapshot connection");
    }
    drop(snapshot);

    let visits = result?;
    Ok(normalize_visits(source.browser(), encoding, visits))
}

/// Turn raw rows into entries, dropping any that cannot be timestamped.
pub fn normalize_visits(
    browser: Browser,
    encoding: TimeEncoding,
    visits: Vec<RawVisit>,
) -> Vec<HistoryEntry> {
    let total = visits.len();
    let entries: Vec<HistoryEntry> = visits
        .into_iter()
        .filter_map(|visit| {
            let url = visit.url.filter(|u| !u.is_empty())?;
            let visit_time = visit.visited.and_then(|t| encoding.to_utc(t))?;
            Some(HistoryEntry {
                source: browser,
                url,
                title: visit.title.unwrap_or_default(),
                visit_time,
            })
        })
        .collect();

    let dropped = total - entries.len();
    if dropped > 0 {
        debug!(source = %browser, dropped, "dropped rows without url or timestamp");
    }
    entries
}
