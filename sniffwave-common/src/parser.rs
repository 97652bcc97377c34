//! Status line decoder for the sniffwave feed.
//!
//! The feed is not a delimited format: the channel identity sits in a fixed
//! 16 character column and everything else is picked out positionally from
//! the numeric tokens that follow. Anything that does not fit the expected
//! shape decodes to `None`; the decoder never fails.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::timestamp::from_epoch_seconds;
use crate::types::{ChannelKey, ConditionReading, Reading, SampleReading};

/// Lines shorter than this are incomplete.
pub const MIN_LINE_LEN: usize = 125;
/// Lines at least this long are regular status lines, shorter ones are
/// special-condition lines.
pub const SAMPLE_LINE_LEN: usize = 170;
/// Width of the `STA.CHA.NET.LOC` column.
const SCNL_WIDTH: usize = 16;
/// Numeric tokens are collected from this column onwards.
const NUMBERS_OFFSET: usize = 33;
const MIN_NUMBERS: usize = 15;

/// Index of the epoch start time in a special-condition line.
const CONDITION_START_INDEX: usize = 7;
/// Index of the epoch start time in a regular status line.
const SAMPLE_START_INDEX: usize = 8;

static SCNL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]+\.[A-Z0-9]+\.[A-Z0-9]+").expect("valid SCNL regex"));

static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+|\d+").expect("valid number regex"));

/// Decode one feed line, stamping it with the current time.
pub fn decode(line: &str) -> Option<Reading> {
    decode_at(line, Utc::now())
}

/// Decode one feed line with an explicit decode timestamp.
pub fn decode_at(line: &str, recorded_at: DateTime<Utc>) -> Option<Reading> {
    debug!("Parsing line: {}", line);

    let line_len = line.chars().count();
    if line_len < MIN_LINE_LEN {
        warn!(
            "sniffwave line has {} characters, expected at least {}",
            line_len, MIN_LINE_LEN
        );
        return None;
    }

    if !SCNL_PATTERN.is_match(line.trim_start()) {
        warn!("sniffwave line does not start with a SCNL pattern");
        return None;
    }

    let key = parse_scnl(char_slice(line, 0, Some(SCNL_WIDTH)))?;

    let numbers: Vec<&str> = NUMBER_PATTERN
        .find_iter(char_slice(line, NUMBERS_OFFSET, None))
        .map(|m| m.as_str())
        .collect();
    if numbers.len() < MIN_NUMBERS {
        warn!(
            "sniffwave line has {} numeric fields, expected at least {}",
            numbers.len(),
            MIN_NUMBERS
        );
        return None;
    }

    if line_len < SAMPLE_LINE_LEN {
        let condition = char_slice(line, SCNL_WIDTH, None)
            .trim_start()
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_string();

        return Some(Reading::Condition(ConditionReading {
            key,
            condition,
            start_time: epoch_at(&numbers, CONDITION_START_INDEX)?,
            end_time: epoch_at(&numbers, numbers.len() - 1)?,
            recorded_at,
        }));
    }

    let last = numbers.len() - 1;
    Some(Reading::Sample(SampleReading {
        key,
        n_samples: numbers[0].parse().ok()?,
        sample_rate: numbers[1].parse().ok()?,
        start_time: epoch_at(&numbers, SAMPLE_START_INDEX)?,
        n_bytes: numbers[last - 2].parse().ok()?,
        data_latency: numbers[last - 1].parse().ok()?,
        feeding_latency: numbers[last].parse().ok()?,
        recorded_at,
    }))
}

/// Split the fixed-width `STA.CHA.NET.LOC` column into a channel key.
fn parse_scnl(column: &str) -> Option<ChannelKey> {
    let fields: Vec<&str> = column.trim().split('.').collect();
    match fields.as_slice() {
        [station, channel, network, location] => {
            Some(ChannelKey::new(*network, *station, *location, *channel))
        }
        _ => {
            warn!("SCNL column '{}' does not have 4 fields", column.trim());
            None
        }
    }
}

fn epoch_at(numbers: &[&str], index: usize) -> Option<DateTime<Utc>> {
    let secs: f64 = numbers.get(index)?.parse().ok()?;
    from_epoch_seconds(secs)
}

/// Character-indexed slice that never panics on short or multi-byte input.
fn char_slice(line: &str, start: usize, end: Option<usize>) -> &str {
    let byte_at = |n: usize| {
        line.char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(line.len())
    };
    let from = byte_at(start);
    let to = end.map(byte_at).unwrap_or(line.len());
    &line[from..to.max(from)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::format_snapshot;

    const SAMPLE_LINE: &str = "  MGR.HHZ.IV.-- (0x32 0x30) 0 s4 484 100.0 2010/06/22 20:10:38.29 (1277237438.2900) 2010/06/22 14:10:41.12 (1277215841.1200) 0x00 0x00 i73 m52 t19 len2000 [D:322.9s F:20.9s]";
    const GAP_LINE: &str = "  MGR.HHZ.IV.-- GAP 2.00s (0x32 0x30) 2010/06/22 14:10:36.29 (1277215836.2900) 2010/06/22 14:10:38.29 gap until (1277215838.2900)";

    #[test]
    fn test_decode_sample_line() {
        let reading = decode(SAMPLE_LINE).expect("sample line decodes");
        let sample = match reading {
            Reading::Sample(sample) => sample,
            other => panic!("expected a sample reading, got {:?}", other),
        };
        assert_eq!(sample.key.to_string(), "IV.MGR..HHZ");
        assert_eq!(sample.n_samples, 484);
        assert_eq!(sample.sample_rate, 100.0);
        assert_eq!(
            format_snapshot(&sample.start_time),
            "2010-06-22 20:10:38.290000"
        );
        assert_eq!(sample.n_bytes, 2000);
        assert_eq!(sample.data_latency, 322.9);
        assert_eq!(sample.feeding_latency, 20.9);
    }

    #[test]
    fn test_decode_condition_line() {
        let reading = decode(GAP_LINE).expect("gap line decodes");
        let condition = match reading {
            Reading::Condition(condition) => condition,
            other => panic!("expected a condition reading, got {:?}", other),
        };
        assert_eq!(condition.key.to_string(), "IV.MGR..HHZ");
        assert_eq!(condition.condition, "GAP");
        assert_eq!(
            format_snapshot(&condition.start_time),
            "2010-06-22 14:10:36.290000"
        );
        assert_eq!(
            format_snapshot(&condition.end_time),
            "2010-06-22 14:10:38.290000"
        );
    }

    #[test]
    fn test_decode_uses_given_timestamp() {
        let at = DateTime::from_timestamp(1_277_300_000, 0).unwrap();
        let reading = decode_at(SAMPLE_LINE, at).unwrap();
        assert_eq!(reading.recorded_at(), at);
    }

    #[test]
    fn test_short_lines_are_rejected() {
        assert!(decode("").is_none());
        assert!(decode("Sniffing WAVE_RING for wild.wild.wild.wild").is_none());
        assert!(decode(&SAMPLE_LINE[..124]).is_none());
    }

    #[test]
    fn test_missing_scnl_is_rejected() {
        let line = SAMPLE_LINE.replacen("MGR.HHZ.IV.--", "mgr hhz iv --", 1);
        assert_eq!(line.len(), SAMPLE_LINE.len());
        assert!(decode(&line).is_none());
    }

    #[test]
    fn test_scnl_with_wrong_field_count_is_rejected() {
        let line = SAMPLE_LINE.replacen("MGR.HHZ.IV.--", "MGR.HHZ.IV   ", 1);
        assert!(decode(&line).is_none());
    }

    #[test]
    fn test_too_few_numbers_is_rejected() {
        let line = format!("  MGR.HHZ.IV.-- {}", "x".repeat(160));
        assert!(decode(&line).is_none());
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        let line = format!("  MGR.HHZ.IV.-- {}", "é".repeat(200));
        assert!(decode(&line).is_none());
        let line = "é".repeat(130);
        assert!(decode(&line).is_none());
    }

    #[test]
    fn test_condition_label_is_first_token() {
        let line = GAP_LINE.replacen("GAP", "OOO", 1);
        match decode(&line) {
            Some(Reading::Condition(c)) => assert_eq!(c.condition, "OOO"),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    /// Pad a line with trailing spaces to exactly `width` characters.
    fn padded(line: &str, width: usize) -> String {
        format!("{:<width$}", line, width = width)
    }

    #[test]
    fn test_minimum_width_boundary() {
        let line = "  MGR.HHZ.IV.-- GAP 2.00s (0x32 0x30) 2010/06/22 14:10:36.29 (1277215836.2900) 2010/06/22 14:10:38.29 (1277215838.2900)";

        assert!(decode(&padded(line, MIN_LINE_LEN - 1)).is_none());
        match decode(&padded(line, MIN_LINE_LEN)) {
            Some(Reading::Condition(c)) => {
                assert_eq!(c.condition, "GAP");
                assert_eq!(format_snapshot(&c.end_time), "2010-06-22 14:10:38.290000");
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_sample_width_boundary() {
        let line = "  MGR.HHZ.IV.-- (0x32 0x30) 0 s4 484 100.0 2010/06/22 20:10:38.29 (1277237438.2900) 2010/06/22 14:10:41.12 (1277215841.1200) i73 m52 t19 len2000 [D:322.9s F:20.9s]";

        assert!(matches!(
            decode(&padded(line, SAMPLE_LINE_LEN - 1)),
            Some(Reading::Condition(_))
        ));
        match decode(&padded(line, SAMPLE_LINE_LEN)) {
            Some(Reading::Sample(sample)) => {
                assert_eq!(sample.n_samples, 484);
                assert_eq!(sample.n_bytes, 2000);
                assert_eq!(sample.feeding_latency, 20.9);
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }
}
