//! Merging per-source visits into one timeline, and selecting windows of it.
//!
//! Day boundaries are civil dates in the local time zone. The `_in`
//! variants take an explicit zone so tests do not depend on the machine.

use chrono::{Local, NaiveDate, TimeZone};

use crate::models::HistoryEntry;

/// Concatenate all sequences and sort newest first.
///
/// The sort is stable: entries with equal `visit_time` keep the order in
/// which their sequences were supplied.
pub fn merge_all(sequences: Vec<Vec<HistoryEntry>>) -> Vec<HistoryEntry> {
    let mut timeline: Vec<HistoryEntry> = sequences.into_iter().flatten().collect();
    timeline.sort_by(|a, b| b.visit_time.cmp(&a.visit_time));
    timeline
}

/// Entries whose local civil date is `date`. Performs no fallback.
pub fn select_day(timeline: &[HistoryEntry], date: NaiveDate) -> Vec<HistoryEntry> {
    select_day_in(timeline, date, &Local)
}

/// Entries whose local civil date is within `start..=end`.
pub fn select_range(timeline: &[HistoryEntry], start: NaiveDate, end: NaiveDate) -> Vec<HistoryEntry> {
    select_range_in(timeline, start, end, &Local)
}

pub fn select_day_in<Tz: TimeZone>(
    timeline: &[HistoryEntry],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<HistoryEntry> {
    select_range_in(timeline, date, date, tz)
}

pub fn select_range_in<Tz: TimeZone>(
    timeline: &[HistoryEntry],
    start: NaiveDate,
    end: NaiveDate,
    tz: &Tz,
) -> Vec<HistoryEntry> {
    timeline
        .iter()
        .filter(|entry| {
            let day = entry.visit_time.with_timezone(tz).date_naive();
            start <= day && day <= end
        })
        .cloned()
        .collect()
}
