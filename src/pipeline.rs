//! Digest orchestration.
//!
//! Coordinates the full flow: sources → snapshot reads → merged timeline →
//! day / range selection → classification → Markdown reports.
//!
//! Sources are read one after another on the calling task. Each read is
//! self-contained (its snapshot is created and removed inside
//! [`read_source`]), so dropping the future returned by [`run_digest`] at
//! any await point leaves no temporary files behind. Classification, which
//! may call a Lua tagger, runs on a blocking thread ([`classify_digest`]).

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use crate::classify::Classifier;
use crate::config::Config;
use crate::models::{ClassifiedEntry, HistoryEntry};
use crate::reader::read_source;
use crate::report;
use crate::sources::build_registry;
use crate::tagger::LuaTagger;
use crate::timeline::{merge_all, select_day, select_range};
use crate::traits::SourceRegistry;

/// Read every registered source and merge the results, newest first.
pub async fn collect_timeline(
    registry: &SourceRegistry,
    lookback_days: u32,
    now: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let mut per_source = Vec::with_capacity(registry.len());
    for source in registry.sources() {
        per_source.push(read_source(source.as_ref(), lookback_days, now).await);
    }
    merge_all(per_source)
}

/// Entries for the daily note.
///
/// When nothing was visited on `date`, falls back to the newest `limit`
/// entries of the whole timeline so the note is never empty while history
/// exists.
pub fn daily_entries(timeline: &[HistoryEntry], date: NaiveDate, limit: usize) -> Vec<HistoryEntry> {
    let day = select_day(timeline, date);
    if !day.is_empty() {
        return day;
    }
    timeline.iter().take(limit).cloned().collect()
}

/// Inclusive date range covered by the weekly summary ending on `end`.
pub fn weekly_range(end: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    let span = i64::from(lookback_days.max(1)) - 1;
    let start = end
        .checked_sub_signed(Duration::days(span))
        .unwrap_or(NaiveDate::MIN);
    (start, end)
}

/// Classifier from config, with the Lua tagger attached when configured.
pub fn build_classifier(config: &Config) -> Result<Classifier> {
    let classifier = Classifier::from_config(&config.classifier);
    match &config.tagger {
        Some(tagger_config) => {
            let tagger = LuaTagger::from_config(tagger_config)?;
            info!(tagger = %tagger.script_path().display(), "external tagger loaded");
            Ok(classifier.with_tagger(Box::new(tagger)))
        }
        None => Ok(classifier),
    }
}

/// Classified daily and weekly selections for one run.
#[derive(Debug, Clone)]
pub struct Digest {
    pub date: NaiveDate,
    pub daily: Vec<ClassifiedEntry>,
    pub week_start: NaiveDate,
    pub weekly: Vec<ClassifiedEntry>,
}

/// Select and classify both report windows from a merged timeline.
pub fn build_digest(
    timeline: &[HistoryEntry],
    date: NaiveDate,
    config: &Config,
    classifier: &Classifier,
) -> Digest {
    let daily = daily_entries(timeline, date, config.history.daily_fallback_limit);
    let (week_start, week_end) = weekly_range(date, config.history.lookback_days);
    let weekly = select_range(timeline, week_start, week_end);

    Digest {
        date,
        daily: classifier.classify_all(&daily),
        week_start,
        weekly: classifier.classify_all(&weekly),
    }
}

/// [`build_digest`] on a blocking thread.
///
/// Lua taggers run synchronously, up to their timeout per entry, and must
/// not hold a runtime worker while `run` is racing Ctrl-C.
pub async fn classify_digest(
    timeline: Vec<HistoryEntry>,
    date: NaiveDate,
    config: Config,
    classifier: Arc<Classifier>,
) -> Result<Digest> {
    tokio::task::spawn_blocking(move || build_digest(&timeline, date, &config, &classifier))
        .await
        .context("classification task panicked")
}

/// `hdigest run`: read, classify, and write both reports.
pub async fn run_digest(config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let classifier = Arc::new(build_classifier(config)?);
    let registry = build_registry(config);

    let timeline = collect_timeline(&registry, config.history.lookback_days, Utc::now()).await;
    info!(entries = timeline.len(), sources = registry.len(), "timeline merged");

    let digest = classify_digest(timeline, date, config.clone(), classifier).await?;

    let daily_md = report::render_daily(digest.date, &digest.daily);
    let daily_path = report::write_daily(&config.output, digest.date, &daily_md)?;
    println!("Daily written: {}", daily_path.display());

    let weekly_md = report::render_weekly(digest.week_start, digest.date, &digest.weekly);
    let weekly_path =
        report::write_weekly(&config.output, digest.week_start, digest.date, &weekly_md)?;
    println!("Weekly written: {}", weekly_path.display());

    Ok(())
}
