use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use super::record::ArrivalRecord;
use crate::error::SnapshotError;
use crate::timestamp::{format_snapshot, parse_snapshot};
use crate::types::{ChannelKey, SampleReading};

/// A channel is stale once its last packet started more than this long ago.
pub const STALE_AFTER_SECS: i64 = 3600;

/// Latest arrival per channel, one record per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrivalMap {
    records: BTreeMap<ChannelKey, ArrivalRecord>,
}

impl ArrivalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&ArrivalRecord> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrivalRecord> {
        self.records.values()
    }

    /// Insert or replace the record for its channel (last write wins).
    pub fn upsert(&mut self, record: ArrivalRecord) -> Option<ArrivalRecord> {
        self.records.insert(record.key.clone(), record)
    }

    /// Number of channels whose last packet is older than `max_age` at `now`.
    pub fn staleness(&self, now: DateTime<Utc>, max_age: TimeDelta) -> usize {
        self.records
            .values()
            .filter(|record| now - record.start_time > max_age)
            .count()
    }

    /// All records, highest total latency first. Ties keep key order.
    pub fn sorted_by_latency_desc(&self) -> Vec<&ArrivalRecord> {
        let mut sorted: Vec<&ArrivalRecord> = self.records.values().collect();
        sorted.sort_by(|a, b| b.total_latency().total_cmp(&a.total_latency()));
        sorted
    }

    /// Parse snapshot text: `key,start_time,data_latency,feeding_latency`
    /// per line. Blank lines are skipped, anything else malformed rejects
    /// the whole snapshot.
    pub fn parse_snapshot(text: &str, path: &Path) -> Result<Self, SnapshotError> {
        let mut map = Self::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let corrupt = |reason: String| SnapshotError::Corrupt {
                path: path.to_path_buf(),
                line_number: idx + 1,
                reason,
            };

            let fields: Vec<&str> = line.split(',').collect();
            let [key, start_time, data_latency, feeding_latency] = fields.as_slice() else {
                return Err(corrupt(format!("expected 4 fields, found {}", fields.len())));
            };

            let key: ChannelKey = key.trim().parse().map_err(corrupt)?;
            let start_time = parse_snapshot(start_time)
                .ok_or_else(|| corrupt(format!("invalid start time '{}'", start_time)))?;
            let data_latency: f64 = data_latency
                .trim()
                .parse()
                .map_err(|_| corrupt(format!("invalid data latency '{}'", data_latency)))?;
            let feeding_latency: f64 = feeding_latency
                .trim()
                .parse()
                .map_err(|_| corrupt(format!("invalid feeding latency '{}'", feeding_latency)))?;

            map.upsert(ArrivalRecord {
                key,
                start_time,
                data_latency,
                feeding_latency,
            });
        }

        Ok(map)
    }

    /// Render the whole map in snapshot text form.
    pub fn to_snapshot(&self) -> String {
        self.records
            .values()
            .map(|record| {
                format!(
                    "{},{},{:?},{:?}\n",
                    record.key,
                    format_snapshot(&record.start_time),
                    record.data_latency,
                    record.feeding_latency
                )
            })
            .collect()
    }
}

/// Arrival map backed by a snapshot file, rewritten every `flush_every`
/// recorded batches.
#[derive(Debug)]
pub struct ArrivalStore {
    path: PathBuf,
    map: ArrivalMap,
    flush_every: usize,
    pending: usize,
}

impl ArrivalStore {
    /// Load the snapshot at `path`, creating an empty one if it is missing.
    pub async fn open(path: impl AsRef<Path>, flush_every: usize) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| SnapshotError::Io {
            path: path.clone(),
            source,
        };

        let map = if fs::try_exists(&path).await.map_err(io_err)? {
            let content = fs::read_to_string(&path).await.map_err(io_err)?;
            let map = ArrivalMap::parse_snapshot(&content, &path)?;
            info!("Loaded {} channels from {:?}", map.len(), path);
            map
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await.map_err(io_err)?;
            }
            fs::write(&path, "").await.map_err(io_err)?;
            warn!("File {:?} did not exist, created", path);
            ArrivalMap::new()
        };

        Ok(Self {
            path,
            map,
            flush_every,
            pending: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn map(&self) -> &ArrivalMap {
        &self.map
    }

    /// Batches recorded since the last automatic flush.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Record one batch of samples. Every batch counts as one mutation; the
    /// snapshot is rewritten when the count reaches the flush period.
    pub async fn record<'a, I>(&mut self, samples: I) -> Result<(), SnapshotError>
    where
        I: IntoIterator<Item = &'a SampleReading>,
    {
        for sample in samples {
            self.map.upsert(ArrivalRecord::from(sample));
        }
        self.pending += 1;

        if self.pending >= self.flush_every.max(1) {
            self.pending = 0;
            self.flush().await?;
        }
        Ok(())
    }

    /// Rewrite the snapshot file from the in-memory map.
    ///
    /// Content goes to a sibling temporary file first and is renamed over
    /// the target, so a crash mid-write leaves the previous snapshot intact.
    pub async fn flush(&self) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };
        let tmp_path = self.temp_path();

        fs::write(&tmp_path, self.map.to_snapshot())
            .await
            .map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).await.map_err(io_err)?;

        debug!("Saved {} channels to {:?}", self.map.len(), self.path);
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}
