//! Arrival health evaluation.
//!
//! Two independent checks run over the same arrival map: how many channels
//! went stale, and how many report an elevated total latency. The overall
//! state is the worse of the two.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::range::ThresholdRange;
use super::verdict::{PerfData, Severity, Verdict};
use crate::arrival::{ArrivalMap, STALE_AFTER_SECS};
use crate::error::RangeError;

/// Operator thresholds for the arrival check.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalThresholds {
    /// Number of stale channels that is critical.
    pub critical_stale: ThresholdRange,
    pub warning_stale: ThresholdRange,
    /// Latency (seconds) above which a channel counts as critical.
    pub critical_latency: ThresholdRange,
    pub warning_latency: ThresholdRange,
    /// Number of critical-latency channels that is critical.
    pub critical_count: ThresholdRange,
    pub warning_count: ThresholdRange,
}

impl ArrivalThresholds {
    pub fn parse(
        critical_stale: &str,
        warning_stale: &str,
        critical_latency: &str,
        warning_latency: &str,
        critical_count: &str,
        warning_count: &str,
    ) -> Result<Self, RangeError> {
        Ok(Self {
            critical_stale: critical_stale.parse()?,
            warning_stale: warning_stale.parse()?,
            critical_latency: critical_latency.parse()?,
            warning_latency: warning_latency.parse()?,
            critical_count: critical_count.parse()?,
            warning_count: warning_count.parse()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleResult {
    pub severity: Severity,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelyResult {
    pub severity: Severity,
    /// Channels whose latency trips the critical latency range.
    pub critical: usize,
    /// Channels whose latency trips the warning latency range. A channel
    /// may be counted here and in `critical` at the same time.
    pub warning: usize,
}

/// Classify a value against a critical/warning range pair.
fn classify(value: usize, critical: &ThresholdRange, warning: &ThresholdRange) -> Severity {
    if critical.in_range(value as f64) {
        Severity::Critical
    } else if warning.in_range(value as f64) {
        Severity::Warning
    } else {
        Severity::Ok
    }
}

pub fn check_stale(
    map: &ArrivalMap,
    now: DateTime<Utc>,
    thresholds: &ArrivalThresholds,
) -> StaleResult {
    let count = map.staleness(now, TimeDelta::seconds(STALE_AFTER_SECS));
    let severity = classify(count, &thresholds.critical_stale, &thresholds.warning_stale);
    debug!("{} stale channels: {}", count, severity);
    StaleResult { severity, count }
}

pub fn check_timely(map: &ArrivalMap, thresholds: &ArrivalThresholds) -> TimelyResult {
    let mut critical = 0;
    let mut warning = 0;
    for record in map.iter() {
        let latency = record.total_latency();
        if thresholds.critical_latency.in_range(latency) {
            critical += 1;
        }
        if thresholds.warning_latency.in_range(latency) {
            warning += 1;
        }
    }

    let severity = if thresholds.critical_count.in_range(critical as f64) {
        Severity::Critical
    } else if thresholds.warning_count.in_range(warning as f64) {
        Severity::Warning
    } else {
        Severity::Ok
    };
    debug!(
        "{} critical / {} warning latency channels: {}",
        critical, warning, severity
    );

    TimelyResult {
        severity,
        critical,
        warning,
    }
}

/// Run both checks and assemble the verdict.
pub fn evaluate(map: &ArrivalMap, now: DateTime<Utc>, thresholds: &ArrivalThresholds) -> Verdict {
    let stale = check_stale(map, now, thresholds);
    let timely = check_timely(map, thresholds);
    let severity = stale.severity.resolve(timely.severity);

    let summary = format!(
        "{} - {} channels stale, {} channels with latency above {}s, {} channels with latency above {}s",
        severity,
        stale.count,
        timely.warning,
        thresholds.warning_latency,
        timely.critical,
        thresholds.critical_latency
    );

    let perfdata = vec![
        PerfData::new("stale", stale.count as f64)
            .with_warning(&thresholds.warning_stale)
            .with_critical(&thresholds.critical_stale),
        PerfData::new("critical latency", timely.critical as f64)
            .with_critical(&thresholds.critical_count),
        PerfData::new("warning latency", timely.warning as f64)
            .with_warning(&thresholds.warning_count),
    ];

    let details = map
        .sorted_by_latency_desc()
        .into_iter()
        .map(|record| record.to_string())
        .collect();

    Verdict {
        severity,
        summary,
        perfdata,
        details,
    }
}
