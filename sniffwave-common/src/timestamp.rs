//! Timestamp conversions shared by the decoder and the arrival snapshot.
//!
//! The feed prints epoch seconds with a fractional part; everything in
//! memory is `DateTime<Utc>` truncated to microseconds. Text renderings omit
//! the fraction when it is zero, so readers accept both precisions.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

const DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";
const DATE_TIME_FRACTION: &str = "%Y-%m-%d %H:%M:%S%.f";
const ISO_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S";

/// Convert epoch seconds to a UTC timestamp rounded to the microsecond.
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]`
pub fn format_snapshot(time: &DateTime<Utc>) -> String {
    with_fraction(time, DATE_TIME)
}

/// `YYYY-MM-DDTHH:MM:SS[.ffffff]`
pub fn format_iso(time: &DateTime<Utc>) -> String {
    with_fraction(time, ISO_DATE_TIME)
}

/// Parse a snapshot timestamp, with or without sub-second precision.
pub fn parse_snapshot(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATE_TIME_FRACTION)
        .or_else(|_| NaiveDateTime::parse_from_str(text, DATE_TIME))
        .ok()
        .map(|naive| naive.and_utc())
}

fn with_fraction(time: &DateTime<Utc>, base: &str) -> String {
    if time.nanosecond() == 0 {
        time.format(base).to_string()
    } else {
        format!("{}{}", time.format(base), time.format("%.6f"))
    }
}
