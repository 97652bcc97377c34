use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location code printed by the feed when a channel has no location.
pub const EMPTY_LOCATION: &str = "--";

/// Identity of one data channel, rendered as `NETWORK.STATION.LOCATION.CHANNEL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelKey {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        let location = location.into();
        Self {
            network: network.into(),
            station: station.into(),
            location: if location == EMPTY_LOCATION {
                String::new()
            } else {
                location
            },
            channel: channel.into(),
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl std::str::FromStr for ChannelKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [network, station, location, channel]
                if !network.is_empty() && !station.is_empty() && !channel.is_empty() =>
            {
                Ok(ChannelKey::new(*network, *station, *location, *channel))
            }
            _ => Err(format!("Invalid channel key: {}", s)),
        }
    }
}

/// Regular status line: one packet seen on the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReading {
    pub key: ChannelKey,
    pub n_samples: u64,
    pub sample_rate: f64,
    pub start_time: DateTime<Utc>,
    pub n_bytes: u64,
    /// Seconds from first sample to packet assembly
    pub data_latency: f64,
    /// Seconds from packet assembly to arrival on the ring
    pub feeding_latency: f64,
    /// Wall-clock time the line was decoded
    pub recorded_at: DateTime<Utc>,
}

/// Special-condition line (gap, overlap, out-of-order...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReading {
    pub key: ChannelKey,
    /// Free-text label as printed by the feed, e.g. "GAP", "OVER", "OOO"
    pub condition: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// One decoded feed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    Sample(SampleReading),
    Condition(ConditionReading),
}

impl Reading {
    pub fn key(&self) -> &ChannelKey {
        match self {
            Reading::Sample(s) => &s.key,
            Reading::Condition(c) => &c.key,
        }
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Reading::Sample(s) => s.recorded_at,
            Reading::Condition(c) => c.recorded_at,
        }
    }

    pub fn as_sample(&self) -> Option<&SampleReading> {
        match self {
            Reading::Sample(s) => Some(s),
            Reading::Condition(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_key_display() {
        let key = ChannelKey::new("IV", "MGR", "--", "HHZ");
        assert_eq!(key.location, "");
        assert_eq!(key.to_string(), "IV.MGR..HHZ");

        let key = ChannelKey::new("FR", "SMPL", "00", "BHZ");
        assert_eq!(key.to_string(), "FR.SMPL.00.BHZ");
    }

    #[test]
    fn test_channel_key_from_str() {
        let key: ChannelKey = "IV.MGR..HHZ".parse().unwrap();
        assert_eq!(key, ChannelKey::new("IV", "MGR", "", "HHZ"));

        assert!("IV.MGR.HHZ".parse::<ChannelKey>().is_err());
        assert!("IV.MGR...HHZ".parse::<ChannelKey>().is_err());
        assert!(".MGR..HHZ".parse::<ChannelKey>().is_err());
    }

    #[test]
    fn test_reading_serializes_with_kind_tag() {
        let reading = Reading::Condition(ConditionReading {
            key: ChannelKey::new("IV", "MGR", "", "HHZ"),
            condition: "GAP".to_string(),
            start_time: DateTime::from_timestamp(1277215836, 0).unwrap(),
            end_time: DateTime::from_timestamp(1277215841, 0).unwrap(),
            recorded_at: DateTime::from_timestamp(1277215842, 0).unwrap(),
        });
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["kind"], "condition");
        assert_eq!(json["condition"], "GAP");
        assert_eq!(json["key"]["station"], "MGR");
    }
}
