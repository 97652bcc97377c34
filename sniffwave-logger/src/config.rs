use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

/// Command line of the logger binary. Flags override the config file.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "sniffwave-logger",
    version,
    about = "Decode sniffwave output and dispatch readings to consumers"
)]
pub struct CliArgs {
    /// Arguments passed to sniffwave (ex: WAVE_RING)
    pub cmd_args: Vec<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Max amount of lines to process (-1 for infinite)
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    pub max_lines: Option<i64>,

    /// Max amount of consecutive sniffwave failures (-1 for infinite)
    #[arg(short = 'M', long, allow_negative_numbers = true)]
    pub max_fails: Option<i64>,

    /// Seconds a consumer waits for a reading before stopping
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Print every reading to stdout as JSON
    #[arg(long)]
    pub print: bool,

    /// Track the latest arrival per channel in this file
    #[arg(long)]
    pub arrival_file: Option<PathBuf>,

    /// Rewrite the arrival file every N readings
    #[arg(long)]
    pub flush_every: Option<usize>,

    /// Archive readings as hourly CSV files under this directory
    #[arg(short, long)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintConfig {
    #[serde(default)]
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalConfig {
    pub path: PathBuf,
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_cmd_args")]
    pub cmd_args: Vec<String>,

    /// Negative means unlimited.
    #[serde(default = "default_max_lines")]
    pub max_lines: i64,

    /// Negative means unlimited.
    #[serde(default = "default_max_fails")]
    pub max_fails: i64,

    #[serde(default = "default_queue_timeout_secs")]
    pub queue_timeout_secs: u64,

    #[serde(default = "default_healthcheck_interval_secs")]
    pub healthcheck_interval_secs: u64,

    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub print: PrintConfig,

    pub arrival: Option<ArrivalConfig>,

    pub archive: Option<ArchiveConfig>,
}

fn default_program() -> String {
    "sniffwave".to_string()
}

fn default_cmd_args() -> Vec<String> {
    vec!["WAVE_RING".to_string()]
}

fn default_max_lines() -> i64 {
    -1
}

fn default_max_fails() -> i64 {
    10
}

fn default_queue_timeout_secs() -> u64 {
    10
}

fn default_healthcheck_interval_secs() -> u64 {
    1
}

fn default_terminate_grace_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_flush_every() -> usize {
    10
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            cmd_args: default_cmd_args(),
            max_lines: default_max_lines(),
            max_fails: default_max_fails(),
            queue_timeout_secs: default_queue_timeout_secs(),
            healthcheck_interval_secs: default_healthcheck_interval_secs(),
            terminate_grace_ms: default_terminate_grace_ms(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            print: PrintConfig::default(),
            arrival: None,
            archive: None,
        }
    }
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl LoggerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: LoggerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Load the file named on the command line (if any) and apply the
    /// remaining flags on top of it.
    pub fn load(args: &CliArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if !args.cmd_args.is_empty() {
            self.cmd_args = args.cmd_args.clone();
        }
        if let Some(max_lines) = args.max_lines {
            self.max_lines = max_lines;
        }
        if let Some(max_fails) = args.max_fails {
            self.max_fails = max_fails;
        }
        if let Some(timeout) = args.timeout {
            self.queue_timeout_secs = timeout;
        }
        if args.print {
            self.print.enable = true;
        }

        match (&args.arrival_file, self.arrival.as_mut()) {
            (Some(path), Some(arrival)) => arrival.path = path.clone(),
            (Some(path), None) => {
                self.arrival = Some(ArrivalConfig {
                    path: path.clone(),
                    flush_every: default_flush_every(),
                })
            }
            _ => {}
        }
        if let (Some(flush_every), Some(arrival)) = (args.flush_every, self.arrival.as_mut()) {
            arrival.flush_every = flush_every;
        }

        if let Some(directory) = &args.directory {
            self.archive = Some(ArchiveConfig {
                directory: directory.clone(),
            });
        }

        if args.verbose > 0 {
            let base = LEVELS
                .iter()
                .position(|l| *l == self.log_level)
                .unwrap_or(2);
            let raised = (base + args.verbose as usize).min(LEVELS.len() - 1);
            self.log_level = LEVELS[raised].to_string();
        }

        // Nothing configured means nothing would consume the readings.
        if !self.print.enable && self.arrival.is_none() && self.archive.is_none() {
            self.print.enable = true;
        }
    }

    pub fn line_limit(&self) -> Option<u64> {
        u64::try_from(self.max_lines).ok()
    }

    pub fn fail_limit(&self) -> Option<u64> {
        u64::try_from(self.max_fails).ok()
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_secs.max(1))
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: LoggerConfig = toml::from_str("").unwrap();
        assert_eq!(config, LoggerConfig::default());
        assert_eq!(config.program, "sniffwave");
        assert_eq!(config.cmd_args, vec!["WAVE_RING"]);
        assert_eq!(config.line_limit(), None);
        assert_eq!(config.fail_limit(), Some(10));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
cmd_args = ["WAVE_RING", "wild", "wild", "wild", "wild"]
max_fails = -1
log_level = "debug"

[arrival]
path = "/var/lib/sniffwave/latest_arrival.csv"

[archive]
directory = "/data/sniffwave"
"#,
        )
        .unwrap();

        let config = LoggerConfig::from_file(&path).unwrap();
        assert_eq!(config.cmd_args.len(), 5);
        assert_eq!(config.fail_limit(), None);
        assert_eq!(config.log_level, "debug");
        let arrival = config.arrival.unwrap();
        assert_eq!(arrival.flush_every, 10);
        assert_eq!(
            config.archive.unwrap().directory,
            PathBuf::from("/data/sniffwave")
        );
        assert!(!config.print.enable);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = LoggerConfig::from_file("/nonexistent/sniffwave.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_print_enabled_without_consumers() {
        let mut config = LoggerConfig::default();
        config.apply_args(&CliArgs::default());
        assert!(config.print.enable);

        let mut config = LoggerConfig::default();
        config.apply_args(&CliArgs {
            directory: Some(PathBuf::from("archive")),
            ..Default::default()
        });
        assert!(!config.print.enable);
    }

    #[test]
    fn test_cli_overrides() {
        let args = CliArgs::parse_from([
            "sniffwave-logger",
            "-m",
            "-1",
            "-M",
            "3",
            "-t",
            "5",
            "-vv",
            "--arrival-file",
            "arrival.csv",
            "--flush-every",
            "2",
            "WAVE_RING",
            "IV",
        ]);
        let mut config = LoggerConfig::default();
        config.max_lines = 100;
        config.apply_args(&args);

        assert_eq!(config.cmd_args, vec!["WAVE_RING", "IV"]);
        assert_eq!(config.line_limit(), None);
        assert_eq!(config.fail_limit(), Some(3));
        assert_eq!(config.queue_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level, "trace");
        assert_eq!(
            config.arrival,
            Some(ArrivalConfig {
                path: PathBuf::from("arrival.csv"),
                flush_every: 2,
            })
        );
        assert!(!config.print.enable);
    }
}
