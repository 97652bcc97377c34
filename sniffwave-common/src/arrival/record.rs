use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::format_iso;
use crate::types::{ChannelKey, SampleReading};

/// Latest arrival seen for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    pub key: ChannelKey,
    pub start_time: DateTime<Utc>,
    pub data_latency: f64,
    pub feeding_latency: f64,
}

impl ArrivalRecord {
    pub fn total_latency(&self) -> f64 {
        self.data_latency + self.feeding_latency
    }
}

impl From<&SampleReading> for ArrivalRecord {
    fn from(sample: &SampleReading) -> Self {
        Self {
            key: sample.key.clone(),
            start_time: sample.start_time,
            data_latency: sample.data_latency,
            feeding_latency: sample.feeding_latency,
        }
    }
}

/// Records order by total latency only; distinct records with the same
/// latency are unordered.
impl PartialOrd for ArrivalRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.total_latency().partial_cmp(&other.total_latency()) {
            Some(Ordering::Equal) if self != other => None,
            ordering => ordering,
        }
    }
}

impl std::fmt::Display for ArrivalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {:?}s",
            self.key,
            format_iso(&self.start_time),
            self.total_latency()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::parse_snapshot;

    fn record(key: &str, start: &str, data: f64, feeding: f64) -> ArrivalRecord {
        ArrivalRecord {
            key: key.parse().unwrap(),
            start_time: parse_snapshot(start).unwrap(),
            data_latency: data,
            feeding_latency: feeding,
        }
    }

    #[test]
    fn test_total_latency() {
        let tip = record("MN.TIP..HHZ", "2010-06-22 14:15:20", 3.0, 3.4);
        assert_eq!(tip.total_latency(), 6.4);
    }

    #[test]
    fn test_ordering_by_latency() {
        let slow = record("MN.VTS..BHZ", "2010-06-22 14:15:33.25", 10.5, 2.1);
        let fast = record("CH.PLONS..HHE", "2010-06-22 14:14:58.12", 1.5, 1.0);
        assert!(slow > fast);
        assert!(fast < slow);

        let same_latency = record("CH.OTHER..HHE", "2010-06-22 14:00:00", 1.0, 1.5);
        assert_eq!(fast.partial_cmp(&same_latency), None);
        assert_eq!(fast.partial_cmp(&fast.clone()), Some(Ordering::Equal));
    }

    #[test]
    fn test_display() {
        let mugio = record("CH.MUGIO..HHN", "2010-06-22 14:15:40.358300", 2.0, 1.0);
        assert_eq!(
            mugio.to_string(),
            "CH.MUGIO..HHN, 2010-06-22T14:15:40.358300, 3.0s"
        );
    }
}
