//! Latest arrival per channel and its on-disk snapshot.

mod record;
mod store;

pub use record::ArrivalRecord;
pub use store::{ArrivalMap, ArrivalStore, STALE_AFTER_SECS};
