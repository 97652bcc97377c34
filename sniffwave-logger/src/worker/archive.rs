//! Hourly CSV archive of every decoded reading.
//!
//! Files are partitioned by decode time:
//! `<dir>/YYYY/mm/dd/sniffwave_YYYYmmdd_HH_channels.csv` for samples and
//! `..._errors.csv` for special conditions.

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sniffwave_common::timestamp::format_iso;
use sniffwave_common::{ConditionReading, Reading, SampleReading};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use super::Consumer;

#[derive(Debug, Serialize)]
struct ChannelRow {
    channel: String,
    start_time: String,
    n_samples: u64,
    sample_rate: f64,
    n_bytes: u64,
    data_latency: f64,
    feeding_latency: f64,
    recorded_at: String,
}

impl From<&SampleReading> for ChannelRow {
    fn from(sample: &SampleReading) -> Self {
        Self {
            channel: sample.key.to_string(),
            start_time: format_iso(&sample.start_time),
            n_samples: sample.n_samples,
            sample_rate: sample.sample_rate,
            n_bytes: sample.n_bytes,
            data_latency: sample.data_latency,
            feeding_latency: sample.feeding_latency,
            recorded_at: format_iso(&sample.recorded_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorRow {
    channel: String,
    condition: String,
    start_time: String,
    end_time: String,
    recorded_at: String,
}

impl From<&ConditionReading> for ErrorRow {
    fn from(condition: &ConditionReading) -> Self {
        Self {
            channel: condition.key.to_string(),
            condition: condition.condition.clone(),
            start_time: format_iso(&condition.start_time),
            end_time: format_iso(&condition.end_time),
            recorded_at: format_iso(&condition.recorded_at),
        }
    }
}

/// Currently open hourly file.
struct HourlyFile {
    path: PathBuf,
    writer: BufWriter<File>,
    needs_header: bool,
}

pub struct ArchiveConsumer {
    directory: PathBuf,
    channels: Option<HourlyFile>,
    errors: Option<HourlyFile>,
}

impl ArchiveConsumer {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            channels: None,
            errors: None,
        }
    }

    pub fn file_path(&self, at: &DateTime<Utc>, kind: &str) -> PathBuf {
        self.directory
            .join(at.format("%Y/%m/%d").to_string())
            .join(format!("sniffwave_{}_{}.csv", at.format("%Y%m%d_%H"), kind))
    }

    async fn append<R: Serialize + Sync>(
        slot: &mut Option<HourlyFile>,
        path: PathBuf,
        row: &R,
    ) -> anyhow::Result<()> {
        let mut file = match slot.take() {
            Some(file) if file.path == path => file,
            previous => {
                if let Some(mut previous) = previous {
                    previous.writer.flush().await?;
                }
                open_hourly(path).await?
            }
        };

        let bytes = encode_row(row, file.needs_header)?;
        file.writer.write_all(&bytes).await?;
        file.needs_header = false;
        *slot = Some(file);
        Ok(())
    }
}

async fn open_hourly(path: PathBuf) -> anyhow::Result<HourlyFile> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create archive directory {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("Failed to open archive file {:?}", path))?;
    let needs_header = file.metadata().await?.len() == 0;
    info!("Archiving to {:?}", path);

    Ok(HourlyFile {
        path,
        writer: BufWriter::new(file),
        needs_header,
    })
}

fn encode_row<R: Serialize>(row: &R, header: bool) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(header)
        .from_writer(Vec::new());
    writer.serialize(row)?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to encode CSV row: {}", e.error()))
}

async fn flush_slot(slot: &mut Option<HourlyFile>) -> anyhow::Result<()> {
    if let Some(file) = slot.as_mut() {
        file.writer.flush().await?;
    }
    Ok(())
}

#[async_trait]
impl Consumer for ArchiveConsumer {
    fn name(&self) -> &str {
        "archive"
    }

    async fn consume(&mut self, reading: Reading) -> anyhow::Result<()> {
        let at = reading.recorded_at();
        match &reading {
            Reading::Sample(sample) => {
                let path = self.file_path(&at, "channels");
                Self::append(&mut self.channels, path, &ChannelRow::from(sample)).await
            }
            Reading::Condition(condition) => {
                let path = self.file_path(&at, "errors");
                Self::append(&mut self.errors, path, &ErrorRow::from(condition)).await
            }
        }
    }

    async fn finish(&mut self) -> anyhow::Result<()> {
        flush_slot(&mut self.channels).await?;
        flush_slot(&mut self.errors).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests::gap;
    use sniffwave_common::timestamp::from_epoch_seconds;
    use tempfile::TempDir;

    fn sample(recorded_at: f64) -> Reading {
        Reading::Sample(SampleReading {
            key: "IV.MGR..HHZ".parse().unwrap(),
            n_samples: 484,
            sample_rate: 100.0,
            start_time: from_epoch_seconds(1277237438.29).unwrap(),
            n_bytes: 2000,
            data_latency: 322.9,
            feeding_latency: 20.9,
            recorded_at: from_epoch_seconds(recorded_at).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_hourly_files_with_header() {
        let temp_dir = TempDir::new().unwrap();
        let mut consumer = ArchiveConsumer::new(temp_dir.path());

        // 2010-06-22 20:10:40 and 20:59:59, then 21:00:00
        consumer.consume(sample(1277237440.0)).await.unwrap();
        consumer.consume(sample(1277240399.0)).await.unwrap();
        consumer.consume(sample(1277240400.0)).await.unwrap();
        consumer.finish().await.unwrap();

        let day = temp_dir.path().join("2010/06/22");
        let first = std::fs::read_to_string(day.join("sniffwave_20100622_20_channels.csv")).unwrap();
        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "channel,start_time,n_samples,sample_rate,n_bytes,data_latency,feeding_latency,recorded_at"
        );
        assert_eq!(
            lines[1],
            "IV.MGR..HHZ,2010-06-22T20:10:38.290000,484,100.0,2000,322.9,20.9,2010-06-22T20:10:40"
        );

        let second = std::fs::read_to_string(day.join("sniffwave_20100622_21_channels.csv")).unwrap();
        assert_eq!(second.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_conditions_go_to_errors_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut consumer = ArchiveConsumer::new(temp_dir.path());
        consumer.consume(gap("MGR")).await.unwrap();
        consumer.finish().await.unwrap();

        let path = temp_dir
            .path()
            .join("2010/06/22/sniffwave_20100622_14_errors.csv");
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "channel,condition,start_time,end_time,recorded_at\n\
             IV.MGR..HHZ,GAP,2010-06-22T14:10:36,2010-06-22T14:10:38,2010-06-22T14:10:40\n"
        );
    }

    #[tokio::test]
    async fn test_reopening_appends_without_header() {
        let temp_dir = TempDir::new().unwrap();
        for _ in 0..2 {
            let mut consumer = ArchiveConsumer::new(temp_dir.path());
            consumer.consume(sample(1277237440.0)).await.unwrap();
            consumer.finish().await.unwrap();
        }

        let path = temp_dir
            .path()
            .join("2010/06/22/sniffwave_20100622_20_channels.csv");
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.matches("channel,start_time").count(), 1);
    }
}
