//! Native timestamp encodings and their conversion to UTC.
//!
//! Every browser stores visit times in its own epoch and unit. Readers use
//! [`TimeEncoding::from_utc`] to express the lookback cutoff in the store's
//! native units, and [`TimeEncoding::to_utc`] to normalize each row. Both
//! directions are exact to the microsecond.
//!
//! | Encoding | Epoch | Unit | Used by |
//! |----------|-------|------|---------|
//! | `webkit-micros` | 1601-01-01 UTC | µs, integer | Chrome, Brave |
//! | `unix-seconds` | 1970-01-01 UTC | s, real | Safari (default) |
//! | `unix-micros` | 1970-01-01 UTC | µs, integer | Firefox |
//! | `cocoa-seconds` | 2001-01-01 UTC | s, real | Safari (Core Data) |

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Seconds between 1601-01-01 and 1970-01-01.
const WEBKIT_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Seconds between 1970-01-01 and 2001-01-01.
const COCOA_EPOCH_OFFSET_SECS: i64 = 978_307_200;

const MICROS_PER_SEC: i64 = 1_000_000;

/// A raw timestamp value as stored in a history database.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeTime {
    Integer(i64),
    Real(f64),
}

/// How a history store encodes visit times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeEncoding {
    WebkitMicros,
    UnixSeconds,
    UnixMicros,
    CocoaSeconds,
}

impl TimeEncoding {
    /// Convert a native value to a UTC instant.
    ///
    /// Returns `None` for values that cannot denote an instant: non-finite
    /// reals and anything outside chrono's representable range.
    pub fn to_utc(self, native: NativeTime) -> Option<DateTime<Utc>> {
        let unix_micros = match self {
            TimeEncoding::WebkitMicros => {
                integer_micros(native)?.checked_sub(WEBKIT_EPOCH_OFFSET_SECS * MICROS_PER_SEC)?
            }
            TimeEncoding::UnixMicros => integer_micros(native)?,
            TimeEncoding::UnixSeconds => real_seconds_to_micros(native)?,
            TimeEncoding::CocoaSeconds => real_seconds_to_micros(native)?
                .checked_add(COCOA_EPOCH_OFFSET_SECS * MICROS_PER_SEC)?,
        };
        DateTime::from_timestamp_micros(unix_micros)
    }

    /// Express a UTC instant in this encoding's native representation.
    pub fn from_utc(self, instant: DateTime<Utc>) -> NativeTime {
        let unix_micros = instant.timestamp_micros();
        match self {
            TimeEncoding::WebkitMicros => NativeTime::Integer(
                unix_micros.saturating_add(WEBKIT_EPOCH_OFFSET_SECS * MICROS_PER_SEC),
            ),
            TimeEncoding::UnixMicros => NativeTime::Integer(unix_micros),
            TimeEncoding::UnixSeconds => NativeTime::Real(micros_to_seconds(unix_micros)),
            TimeEncoding::CocoaSeconds => NativeTime::Real(micros_to_seconds(
                unix_micros - COCOA_EPOCH_OFFSET_SECS * MICROS_PER_SEC,
            )),
        }
    }

    /// Whether values in this encoding are stored as SQLite REAL.
    pub fn is_real(self) -> bool {
        matches!(self, TimeEncoding::UnixSeconds | TimeEncoding::CocoaSeconds)
    }
}

impl fmt::Display for TimeEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeEncoding::WebkitMicros => "webkit-micros",
            TimeEncoding::UnixSeconds => "unix-seconds",
            TimeEncoding::UnixMicros => "unix-micros",
            TimeEncoding::CocoaSeconds => "cocoa-seconds",
        };
        f.write_str(name)
    }
}

fn integer_micros(native: NativeTime) -> Option<i64> {
    match native {
        NativeTime::Integer(v) => Some(v),
        // SQLite is dynamically typed; tolerate integral reals in integer columns.
        NativeTime::Real(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Some(v as i64)
        }
        NativeTime::Real(_) => None,
    }
}

fn real_seconds_to_micros(native: NativeTime) -> Option<i64> {
    let secs = match native {
        NativeTime::Real(v) => v,
        NativeTime::Integer(v) => v as f64,
    };
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * MICROS_PER_SEC as f64).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(micros as i64)
}

fn micros_to_seconds(micros: i64) -> f64 {
    // Split to keep the whole-second part exact.
    let secs = micros.div_euclid(MICROS_PER_SEC);
    let frac = micros.rem_euclid(MICROS_PER_SEC);
    secs as f64 + frac as f64 / MICROS_PER_SEC as f64
}
