//! Shared model for the sniffwave tools: feed line decoding, the per-channel
//! arrival map with its snapshot file, and the arrival health check.

pub mod arrival;
pub mod error;
pub mod nagios;
pub mod parser;
pub mod timestamp;
pub mod types;

pub use error::{RangeError, SnapshotError};
pub use types::{ChannelKey, ConditionReading, Reading, SampleReading};
