//! Markdown rendering of daily and weekly digests.
//!
//! # Daily note
//!
//! ```text
//! ---
//! date: 2024-03-05
//! tags: [Programming, Reference]
//! type: browser-activity
//! ---
//!
//! # Browser Activity — 2024-03-05
//!
//! ## 🔍 Searches
//! - 09:14 — **google**: rust ownership
//!   - [https://www.google.com/search?q=rust+ownership](https://www.google.com/search?q=rust+ownership)
//!
//! ## Coding (1)
//! - 09:14 — [Search: rust ownership](https://www.google.com/search?q=rust+ownership)
//! ```
//!
//! # Weekly summary
//!
//! One section per topic with its most common domains and up to
//! [`WEEKLY_ITEM_LIMIT`] items.
//!
//! Topic sections are ordered by item count, largest first; topics with the
//! same count keep the order in which they first appear in the input. All
//! times are rendered in the supplied time zone.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{expand_home, OutputConfig};
use crate::models::ClassifiedEntry;

/// Maximum items listed per topic in the weekly summary.
pub const WEEKLY_ITEM_LIMIT: usize = 200;

/// Domains listed per topic in the weekly summary.
pub const TOP_DOMAINS: usize = 5;

const UNTITLED: &str = "(Untitled)";

/// Group entries by topic, preserving first-appearance order, then order
/// groups by size (stable).
fn group_by_topic(entries: &[ClassifiedEntry]) -> Vec<(&str, Vec<&ClassifiedEntry>)> {
    let mut groups: Vec<(&str, Vec<&ClassifiedEntry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(topic, _)| *topic == entry.topic) {
            Some((_, items)) => items.push(entry),
            None => groups.push((entry.topic.as_str(), vec![entry])),
        }
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups
}

fn display_title(entry: &ClassifiedEntry) -> &str {
    if entry.entry.title.is_empty() {
        UNTITLED
    } else {
        &entry.entry.title
    }
}

/// `host[:port]` of a URL, or an empty string if it does not parse.
pub fn domain_of(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Most common domains, count descending, ties in first-appearance order.
fn top_domains(items: &[&ClassifiedEntry], limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        let domain = domain_of(&item.entry.url);
        match counts.iter_mut().find(|(d, _)| *d == domain) {
            Some((_, c)) => *c += 1,
            None => counts.push((domain, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

// ═══════════════════════════════════════════════════════════════════════
// Daily
// ═══════════════════════════════════════════════════════════════════════

pub fn render_daily(date: NaiveDate, entries: &[ClassifiedEntry]) -> String {
    render_daily_in(date, entries, &Local)
}

pub fn render_daily_in<Tz: TimeZone>(
    date: NaiveDate,
    entries: &[ClassifiedEntry],
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let iso = date.format("%Y-%m-%d").to_string();
    let hhmm = |e: &ClassifiedEntry| e.entry.visit_time.with_timezone(tz).format("%H:%M").to_string();

    let all_tags: BTreeSet<&str> = entries
        .iter()
        .flat_map(|e| e.tags.iter().map(String::as_str))
        .collect();

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("date: {}\n", iso));
    out.push_str(&format!(
        "tags: [{}]\n",
        all_tags.into_iter().collect::<Vec<_>>().join(", ")
    ));
    out.push_str("type: browser-activity\n");
    out.push_str("---\n\n");

    out.push_str(&format!("# Browser Activity — {}\n\n", iso));

    out.push_str("## 🔍 Searches\n");
    let searches: Vec<&ClassifiedEntry> = entries.iter().filter(|e| e.search.is_some()).collect();
    if searches.is_empty() {
        out.push_str("_No searches_\n");
    }
    for entry in searches {
        if let Some(search) = &entry.search {
            out.push_str(&format!(
                "- {} — **{}**: {}\n",
                hhmm(entry),
                search.engine,
                search.query
            ));
            out.push_str(&format!("  - [{0}]({0})\n", entry.entry.url));
        }
    }
    out.push('\n');

    for (topic, items) in group_by_topic(entries) {
        out.push_str(&format!("## {} ({})\n", topic, items.len()));
        for entry in items {
            let title = match &entry.search {
                Some(search) => format!("Search: {}", search.query),
                None => display_title(entry).to_string(),
            };
            let tags = entry
                .tags
                .iter()
                .map(|t| format!("`{}`", t))
                .collect::<Vec<_>>()
                .join(" ");
            let line = format!("- {} — [{}]({}) {}", hhmm(entry), title, entry.entry.url, tags);
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

// ═══════════════════════════════════════════════════════════════════════
// Weekly
// ═══════════════════════════════════════════════════════════════════════

pub fn render_weekly(start: NaiveDate, end: NaiveDate, entries: &[ClassifiedEntry]) -> String {
    render_weekly_in(start, end, entries, &Local)
}

pub fn render_weekly_in<Tz: TimeZone>(
    start: NaiveDate,
    end: NaiveDate,
    entries: &[ClassifiedEntry],
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    out.push_str(&format!(
        "# Weekly Browser Summary — {}\n\n",
        range_label(start, end)
    ));

    for (topic, items) in group_by_topic(entries) {
        out.push_str(&format!("## {} — {} items\n", topic, items.len()));
        let domains = top_domains(&items, TOP_DOMAINS)
            .into_iter()
            .map(|(d, c)| format!("{} ({})", d, c))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("**Top domains:** {}\n\n", domains));

        for entry in items.iter().take(WEEKLY_ITEM_LIMIT) {
            let when = entry
                .entry
                .visit_time
                .with_timezone(tz)
                .format("%Y-%m-%d %H:%M");
            out.push_str(&format!(
                "- {} — [{}]({}) — `{}`\n",
                when,
                display_title(entry),
                entry.entry.url,
                entry.tags.join(", ")
            ));
        }
        out.push('\n');
    }

    out
}

fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}_to_{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

// ═══════════════════════════════════════════════════════════════════════
// Output files
// ═══════════════════════════════════════════════════════════════════════

pub fn daily_path(output: &OutputConfig, date: NaiveDate) -> PathBuf {
    output
        .daily_dir()
        .join(format!("{}.md", date.format("%Y-%m-%d")))
}

pub fn weekly_path(output: &OutputConfig, start: NaiveDate, end: NaiveDate) -> PathBuf {
    output
        .weekly_dir()
        .join(format!("weekly-summary-{}.md", range_label(start, end)))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

/// Write the daily note and, if a vault is configured, copy it there.
pub fn write_daily(output: &OutputConfig, date: NaiveDate, contents: &str) -> Result<PathBuf> {
    let path = daily_path(output, date);
    write_file(&path, contents)?;
    info!(path = %path.display(), "daily report written");

    if let Some(vault) = &output.obsidian_vault {
        copy_to_vault(&path, &expand_home(vault));
    }
    Ok(path)
}

pub fn write_weekly(
    output: &OutputConfig,
    start: NaiveDate,
    end: NaiveDate,
    contents: &str,
) -> Result<PathBuf> {
    let path = weekly_path(output, start, end);
    write_file(&path, contents)?;
    info!(path = %path.display(), "weekly report written");
    Ok(path)
}

/// Best-effort copy; a missing or read-only vault only logs a warning.
fn copy_to_vault(note: &Path, vault: &Path) {
    let Some(name) = note.file_name() else {
        return;
    };
    let target = vault.join(name);
    match std::fs::copy(note, &target) {
        Ok(_) => info!(path = %target.display(), "copied daily note to vault"),
        Err(e) => warn!(vault = %vault.display(), error = %e, "failed to copy daily note to vault"),
    }
}
