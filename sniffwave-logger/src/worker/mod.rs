//! Consumers of decoded readings and the worker loop that drives them.

mod archive;
mod arrival;
mod print;

use std::time::Duration;

use async_trait::async_trait;
use sniffwave_common::Reading;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WorkerError;

pub use archive::ArchiveConsumer;
pub use arrival::ArrivalConsumer;
pub use print::PrintConsumer;

/// Something that does work with every reading it is handed.
#[async_trait]
pub trait Consumer: Send {
    fn name(&self) -> &str;

    async fn consume(&mut self, reading: Reading) -> anyhow::Result<()>;

    /// Called once after the last reading.
    async fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// How a worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The stop signal was observed.
    Stopped,
    /// Nothing arrived within the queue timeout.
    QueueTimeout,
    /// Every sender went away.
    QueueClosed,
}

/// Drains one queue into one consumer.
pub struct Worker {
    consumer: Box<dyn Consumer>,
    queue: Option<UnboundedReceiver<Reading>>,
    timeout: Duration,
}

impl Worker {
    pub fn new(consumer: impl Consumer + 'static, timeout: Duration) -> Self {
        Self {
            consumer: Box::new(consumer),
            queue: None,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.consumer.name()
    }

    pub fn set_queue(&mut self, queue: UnboundedReceiver<Reading>) {
        self.queue = Some(queue);
    }

    /// Consume readings until stopped, starved or disconnected. Readings
    /// already queued when the stop signal arrives are still consumed.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<WorkerExit, WorkerError> {
        let name = self.name().to_string();
        let mut queue = self
            .queue
            .take()
            .ok_or_else(|| WorkerError::QueueNotSet(name.clone()))?;

        info!("Worker {} started", name);
        let result = self.drive(&mut queue, &cancel).await;
        let finished = self.consumer.finish().await;

        let exit = result.map_err(|e| self.failure(e))?;
        finished.map_err(|e| self.failure(e))?;
        info!("Worker {} stopped ({:?})", name, exit);
        Ok(exit)
    }

    async fn drive(
        &mut self,
        queue: &mut UnboundedReceiver<Reading>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<WorkerExit> {
        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break WorkerExit::Stopped,
                next = tokio::time::timeout(self.timeout, queue.recv()) => next,
            };
            match next {
                Ok(Some(reading)) => self.consumer.consume(reading).await?,
                Ok(None) => break WorkerExit::QueueClosed,
                Err(_) => {
                    warn!(
                        "Worker {} received nothing for {:?}, stopping",
                        self.name(),
                        self.timeout
                    );
                    break WorkerExit::QueueTimeout;
                }
            }
        };

        let mut drained = 0;
        while let Ok(reading) = queue.try_recv() {
            self.consumer.consume(reading).await?;
            drained += 1;
        }
        if drained > 0 {
            debug!("Worker {} drained {} queued readings", self.name(), drained);
        }
        Ok(exit)
    }

    fn failure(&self, err: anyhow::Error) -> WorkerError {
        WorkerError::Consumer {
            name: self.name().to_string(),
            message: format!("{:#}", err),
        }
    }
}
