use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use sniffwave_common::arrival::ArrivalMap;
use sniffwave_common::nagios::{ArrivalThresholds, Verdict, evaluate};
use tracing::{error, info};

/// Nagios check on channel staleness and latency from the arrival file.
#[derive(Debug, Clone, Parser)]
#[command(name = "check_arrival", version)]
pub struct CheckArgs {
    /// Range of stale channels that triggers a critical state
    #[arg(long, allow_hyphen_values = true)]
    pub critical_stale: String,

    /// Range of stale channels that triggers a warning state
    #[arg(long, allow_hyphen_values = true)]
    pub warning_stale: String,

    /// Latency range (seconds) a channel must leave to count as critical
    #[arg(long, allow_hyphen_values = true)]
    pub critical_latency: String,

    /// Latency range (seconds) a channel must leave to count as warning
    #[arg(long, allow_hyphen_values = true)]
    pub warning_latency: String,

    /// Range of critical-latency channels that triggers a critical state
    #[arg(long, allow_hyphen_values = true)]
    pub critical_count: String,

    /// Range of warning-latency channels that triggers a warning state
    #[arg(long, allow_hyphen_values = true)]
    pub warning_count: String,

    /// File holding the latest arrival per channel
    #[arg(long)]
    pub arrival_file: PathBuf,

    /// Log level (logs go to stderr)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Evaluate the arrival file at `now`. Anything that prevents evaluation
/// becomes an UNKNOWN verdict.
pub async fn run(args: &CheckArgs, now: DateTime<Utc>) -> Verdict {
    match evaluate_file(args, now).await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("{:#}", e);
            Verdict::unknown(format!("{:#}", e))
        }
    }
}

async fn evaluate_file(args: &CheckArgs, now: DateTime<Utc>) -> anyhow::Result<Verdict> {
    let thresholds = ArrivalThresholds::parse(
        &args.critical_stale,
        &args.warning_stale,
        &args.critical_latency,
        &args.warning_latency,
        &args.critical_count,
        &args.warning_count,
    )?;

    let path = &args.arrival_file;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read arrival file {:?}", path))?;
    let map = ArrivalMap::parse_snapshot(&text, path)?;
    info!("Loaded {} channels from {:?}", map.len(), path);

    Ok(evaluate(&map, now, &thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniffwave_common::nagios::Severity;
    use sniffwave_common::timestamp::parse_snapshot;
    use tempfile::TempDir;

    const FIXTURE: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../sniffwave-common/tests/data/latest_arrival.csv"
    );

    fn args(arrival_file: &str, warning_count: &str) -> CheckArgs {
        CheckArgs::parse_from([
            "check_arrival",
            "--critical-stale",
            "9",
            "--warning-stale",
            "5",
            "--critical-latency",
            "10",
            "--warning-latency",
            "8",
            "--critical-count",
            "10",
            "--warning-count",
            warning_count,
            "--arrival-file",
            arrival_file,
        ])
    }

    #[tokio::test]
    async fn test_ok_verdict() {
        let now = parse_snapshot("2010-06-22 15:15:00").unwrap();
        let verdict = run(&args(FIXTURE, "8"), now).await;
        assert_eq!(verdict.severity, Severity::Ok);
        assert!(verdict.summary.starts_with("OK - 3 channels stale"));
        assert_eq!(verdict.details.len(), 14);
    }

    #[tokio::test]
    async fn test_warning_from_latency_count() {
        let now = parse_snapshot("2010-06-22 15:15:00").unwrap();
        let verdict = run(&args(FIXTURE, "6"), now).await;
        assert_eq!(verdict.severity, Severity::Warning);
        assert_eq!(verdict.severity.code(), 1);
    }

    #[tokio::test]
    async fn test_critical_when_most_channels_are_stale() {
        let now = parse_snapshot("2010-06-22 15:16:50").unwrap();
        let verdict = run(&args(FIXTURE, "8"), now).await;
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.summary.starts_with("CRITICAL - 10 channels stale"));
    }

    #[tokio::test]
    async fn test_missing_file_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.csv");
        let verdict = run(&args(path.to_str().unwrap(), "8"), Utc::now()).await;
        assert_eq!(verdict.severity, Severity::Unknown);
        assert!(verdict.summary.starts_with("UNKNOWN - Failed to read arrival file"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("latest_arrival.csv");
        std::fs::write(&path, "IV.MGR..HHZ,2010-06-22 14:15:50,322.9\n").unwrap();

        let verdict = run(&args(path.to_str().unwrap(), "8"), Utc::now()).await;
        assert_eq!(verdict.severity.code(), 3);
    }

    #[tokio::test]
    async fn test_invalid_range_is_unknown() {
        let mut args = args(FIXTURE, "8");
        args.critical_latency = "ten".to_string();
        let verdict = run(&args, Utc::now()).await;
        assert_eq!(verdict.severity, Severity::Unknown);
        assert!(verdict.summary.contains("invalid threshold range 'ten'"));
    }
}
