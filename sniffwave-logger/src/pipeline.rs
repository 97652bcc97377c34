//! Pipeline supervisor - wires the feed to its workers and watches them.
//!
//! Workers are started first, each on its own queue, then the feed. The
//! supervisor polls every participant on a fixed interval; as soon as one of
//! them has stopped (or the caller cancels), everyone is told to stop and
//! the supervisor waits for all of them.

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::LoggerConfig;
use crate::error::{SniffwaveError, WorkerError};
use crate::sniffwave::{IngestOutcome, Sniffwave};
use crate::worker::{ArchiveConsumer, ArrivalConsumer, PrintConsumer, Worker, WorkerExit};

/// Name the feed participant is reported under.
pub const SNIFFWAVE: &str = "sniffwave";

/// What happened to every participant.
#[derive(Debug)]
pub struct PipelineReport {
    /// First participant seen stopped, `None` if the caller cancelled.
    pub first_stopped: Option<String>,
    pub sniffwave: anyhow::Result<IngestOutcome>,
    pub workers: Vec<(String, anyhow::Result<WorkerExit>)>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.sniffwave.is_ok() && self.workers.iter().all(|(_, r)| r.is_ok())
    }

    pub fn log_summary(&self) {
        match &self.sniffwave {
            Ok(outcome) => info!("{}: {:?}", SNIFFWAVE, outcome),
            Err(e) => error!("{}: {:#}", SNIFFWAVE, e),
        }
        for (name, result) in &self.workers {
            match result {
                Ok(exit) => info!("worker {}: {:?}", name, exit),
                Err(e) => error!("worker {}: {:#}", name, e),
            }
        }
    }
}

pub struct Pipeline {
    sniffwave: Sniffwave,
    workers: Vec<Worker>,
    healthcheck_interval: Duration,
}

impl Pipeline {
    pub fn new(sniffwave: Sniffwave, healthcheck_interval: Duration) -> Self {
        Self {
            sniffwave,
            workers: Vec::new(),
            healthcheck_interval,
        }
    }

    /// Build the feed and every consumer enabled in `config`.
    pub async fn from_config(config: &LoggerConfig) -> anyhow::Result<Self> {
        let sniffwave = Sniffwave::new(config.program.clone(), config.cmd_args.clone())
            .with_max_lines(config.line_limit())
            .with_max_fails(config.fail_limit())
            .with_terminate_grace(config.terminate_grace());
        let mut pipeline = Self::new(sniffwave, config.healthcheck_interval());
        let timeout = config.queue_timeout();

        if config.print.enable {
            pipeline.add_worker(Worker::new(PrintConsumer::stdout(), timeout));
        }
        if let Some(arrival) = &config.arrival {
            let consumer = ArrivalConsumer::open(&arrival.path, arrival.flush_every).await?;
            pipeline.add_worker(Worker::new(consumer, timeout));
        }
        if let Some(archive) = &config.archive {
            pipeline.add_worker(Worker::new(
                ArchiveConsumer::new(&archive.directory),
                timeout,
            ));
        }
        Ok(pipeline)
    }

    pub fn add_worker(&mut self, worker: Worker) {
        self.workers.push(worker);
    }

    pub fn worker_names(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.name().to_string()).collect()
    }

    pub async fn run(self, cancel: CancellationToken) -> PipelineReport {
        let Self {
            mut sniffwave,
            workers,
            healthcheck_interval,
        } = self;
        let stop = cancel.child_token();

        let mut worker_handles: Vec<(String, JoinHandle<Result<WorkerExit, WorkerError>>)> =
            Vec::with_capacity(workers.len());
        for mut worker in workers {
            let (tx, rx) = unbounded_channel();
            worker.set_queue(rx);
            sniffwave.add_queue(tx);
            let name = worker.name().to_string();
            worker_handles.push((name, tokio::spawn(worker.run(stop.child_token()))));
        }
        info!("Started {} workers", worker_handles.len());

        let sniffwave_handle: JoinHandle<Result<IngestOutcome, SniffwaveError>> =
            tokio::spawn(sniffwave.run(stop.child_token()));

        let mut interval = tokio::time::interval(healthcheck_interval);
        let first_stopped = loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    info!("Stop requested");
                    break None;
                }
                _ = interval.tick() => {
                    debug!("Health check");
                    if sniffwave_handle.is_finished() {
                        info!("Sniffwave stopped...");
                        break Some(SNIFFWAVE.to_string());
                    }
                    if let Some((name, _)) = worker_handles.iter().find(|(_, h)| h.is_finished()) {
                        info!("Worker {} stopped...", name);
                        break Some(name.clone());
                    }
                }
            }
        };

        stop.cancel();
        let sniffwave = flatten(sniffwave_handle.await);
        let (names, handles): (Vec<_>, Vec<_>) = worker_handles.into_iter().unzip();
        let workers = names
            .into_iter()
            .zip(join_all(handles).await.into_iter().map(flatten))
            .collect();

        PipelineReport {
            first_stopped,
            sniffwave,
            workers,
        }
    }
}

fn flatten<T, E>(joined: Result<Result<T, E>, tokio::task::JoinError>) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Ok(joined??)
}
