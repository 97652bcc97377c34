use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::Context;
use tokio::{fs, task};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const MAX_LOG_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 3);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Keeps the non-blocking file writer alive; drop it last.
#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

/// Map a configured level to one `EnvFilter` understands. Unknown levels
/// fall back to `info` and come back flagged as invalid.
pub fn resolve_level(level: &str) -> (&'static str, bool) {
    match level.to_ascii_lowercase().as_str() {
        "trace" => ("trace", true),
        "debug" => ("debug", true),
        "info" => ("info", true),
        "warn" | "warning" => ("warn", true),
        "error" => ("error", true),
        _ => ("info", false),
    }
}

/// Install stderr and daily-rolling file logging, and start removing log
/// files older than three days. Stdout is left to the print consumer.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    prefix: &str,
    level: &str,
) -> anyhow::Result<LoggerGuard> {
    let log_dir = log_dir.as_ref().to_path_buf();
    let requested = level;
    let (level, valid) = resolve_level(requested);

    let builder = EnvFilter::builder().with_default_directive(level.parse()?);
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let console_filter = builder.clone().parse_lossy(&rust_log);
    let file_filter = builder.parse_lossy(&rust_log);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .with_context(|| format!("Failed to create log file appender in {:?}", log_dir))?;
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    if !valid {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", requested);
    }

    start_log_cleanup_task(log_dir, prefix.to_string());

    Ok(LoggerGuard(guard))
}

fn start_log_cleanup_task(log_dir: PathBuf, prefix: String) {
    task::spawn(async move {
        loop {
            match cleanup_old_logs(&log_dir, &prefix, MAX_LOG_AGE).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Removed {} old log files", removed),
                Err(e) => tracing::warn!("Failed to delete old log file: {}", e),
            }
            tokio::time::sleep(CLEANUP_INTERVAL).await;
        }
    });
}

/// Delete `<prefix>*.log` files in `log_dir` last modified more than
/// `max_age` ago. Returns how many were removed.
pub async fn cleanup_old_logs(
    log_dir: &Path,
    prefix: &str,
    max_age: Duration,
) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    let mut entries = fs::read_dir(log_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with(prefix) || !file_name.ends_with(".log") {
            continue;
        }

        let modified = entry.metadata().await?.modified()?;
        if now.duration_since(modified).unwrap_or_default() > max_age {
            fs::remove_file(&path).await?;
            tracing::info!("Old log file deleted: {}", file_name);
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level("debug"), ("debug", true));
        assert_eq!(resolve_level("WARNING"), ("warn", true));
        assert_eq!(resolve_level("verbose"), ("info", false));
        assert_eq!(resolve_level(""), ("info", false));
    }

    #[tokio::test]
    async fn test_cleanup_only_touches_old_prefixed_logs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join("sniffwave-logger.2010-06-22.log"), "old").unwrap();
        std::fs::write(dir.join("other.2010-06-22.log"), "other").unwrap();
        std::fs::write(dir.join("sniffwave-logger.txt"), "not a log").unwrap();

        let removed = cleanup_old_logs(dir, "sniffwave-logger", MAX_LOG_AGE)
            .await
            .unwrap();
        assert_eq!(removed, 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = cleanup_old_logs(dir, "sniffwave-logger", Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.join("sniffwave-logger.2010-06-22.log").exists());
        assert!(dir.join("other.2010-06-22.log").exists());
        assert!(dir.join("sniffwave-logger.txt").exists());
    }
}
