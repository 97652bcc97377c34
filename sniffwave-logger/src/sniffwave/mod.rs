//! Supervision of the external `sniffwave` program and decoding of its
//! output.

mod client;
mod process;

pub use client::{IngestOutcome, Sniffwave};
pub use process::FeedProcess;
