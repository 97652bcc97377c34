//! Nagios-style health checks over the arrival map.

mod check;
mod range;
mod verdict;

pub use check::{ArrivalThresholds, StaleResult, TimelyResult, check_stale, check_timely, evaluate};
pub use range::ThresholdRange;
pub use verdict::{PerfData, Severity, Verdict};
