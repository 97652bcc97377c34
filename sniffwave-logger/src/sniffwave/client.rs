use std::time::Duration;

use sniffwave_common::Reading;
use sniffwave_common::parser;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::process::FeedProcess;
use crate::error::SniffwaveError;

/// Why the ingestion loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The stop signal was observed.
    Stopped,
    /// The configured number of readings was dispatched.
    LineLimitReached,
    /// Too many consecutive lines failed to decode.
    FailureLimitReached,
    /// The program closed its output and exited successfully.
    ProgramExited,
}

/// Consecutive failures left before giving up. `None` never runs out.
#[derive(Debug, Clone, Copy)]
struct FailureBudget {
    limit: Option<u64>,
    remaining: u64,
}

impl FailureBudget {
    fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            remaining: limit.unwrap_or(0),
        }
    }

    fn fail(&mut self) {
        if self.limit.is_some() {
            self.remaining = self.remaining.saturating_sub(1);
            debug!("Reducing max fail count: {}", self.remaining);
        }
    }

    fn reset(&mut self) {
        self.remaining = self.limit.unwrap_or(0);
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some() && self.remaining == 0
    }
}

/// Runs the feed program, decodes its output and fans readings out to every
/// registered queue.
pub struct Sniffwave {
    program: String,
    args: Vec<String>,
    max_lines: Option<u64>,
    max_fails: Option<u64>,
    terminate_grace: Duration,
    queues: Vec<UnboundedSender<Reading>>,
}

impl Sniffwave {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            max_lines: None,
            max_fails: None,
            terminate_grace: Duration::from_secs(1),
            queues: Vec::new(),
        }
    }

    /// Stop after dispatching this many readings.
    pub fn with_max_lines(mut self, max_lines: Option<u64>) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Stop after this many consecutive unusable reads.
    pub fn with_max_fails(mut self, max_fails: Option<u64>) -> Self {
        self.max_fails = max_fails;
        self
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn add_queue(&mut self, queue: UnboundedSender<Reading>) {
        self.queues.push(queue);
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<IngestOutcome, SniffwaveError> {
        info!("Executing: {} {}", self.program, self.args.join(" "));
        let mut process = FeedProcess::spawn(&self.program, &self.args)?;

        let result = self.pump(&mut process, &cancel).await;
        match &result {
            Ok(outcome) => info!("Stopping {} gracefully ({:?})", self.program, outcome),
            Err(e) => error!("{}", e),
        }

        match process.terminate(self.terminate_grace).await {
            Ok(status) => debug!("{} finished with {}", self.program, status),
            Err(e) => warn!("{}", e),
        }
        result
    }

    async fn pump(
        &mut self,
        process: &mut FeedProcess,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome, SniffwaveError> {
        let mut fails = FailureBudget::new(self.max_fails);
        let mut remaining = self.max_lines;
        let mut buf = Vec::new();

        loop {
            if remaining == Some(0) {
                return Ok(IngestOutcome::LineLimitReached);
            }
            if fails.exhausted() {
                warn!("{} produced too many unusable lines", self.program);
                return Ok(IngestOutcome::FailureLimitReached);
            }

            debug!(
                "Waiting for {} (count: {:?}, fail decount: {})",
                self.program, remaining, fails.remaining
            );
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(IngestOutcome::Stopped),
                read = process.read_line(&mut buf) => read?,
            };

            if read == 0 {
                fails.fail();
                if fails.exhausted() {
                    return Ok(IngestOutcome::FailureLimitReached);
                }
                return self.wait_for_exit(process, cancel).await;
            }

            // Widths are measured without the line terminator.
            let line = String::from_utf8_lossy(&buf);
            let Some(reading) = parser::decode(line.trim_end_matches(['\r', '\n'])) else {
                fails.fail();
                continue;
            };

            fails.reset();
            self.dispatch(reading);
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
        }
    }

    /// The program closed stdout: its exit status decides the outcome.
    async fn wait_for_exit(
        &self,
        process: &mut FeedProcess,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome, SniffwaveError> {
        let status = tokio::select! {
            _ = cancel.cancelled() => return Ok(IngestOutcome::Stopped),
            status = process.wait() => status?,
        };
        if status.success() {
            info!("{} exited", process.program());
            Ok(IngestOutcome::ProgramExited)
        } else {
            Err(SniffwaveError::UnexpectedExit {
                program: self.program.clone(),
                status,
            })
        }
    }

    fn dispatch(&self, reading: Reading) {
        for queue in &self.queues {
            if queue.send(reading.clone()).is_err() {
                debug!("Dropping reading for {}: queue closed", reading.key());
            }
        }
    }
}
