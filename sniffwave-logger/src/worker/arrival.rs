use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use sniffwave_common::Reading;
use sniffwave_common::arrival::ArrivalStore;
use tracing::info;

use super::Consumer;

/// Keeps the latest arrival per channel and its snapshot file current.
pub struct ArrivalConsumer {
    store: ArrivalStore,
}

impl ArrivalConsumer {
    pub async fn open(path: impl AsRef<Path>, flush_every: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let store = ArrivalStore::open(path, flush_every)
            .await
            .with_context(|| format!("Failed to open arrival file {:?}", path))?;
        Ok(Self { store })
    }

    pub fn store(&self) -> &ArrivalStore {
        &self.store
    }
}

#[async_trait]
impl Consumer for ArrivalConsumer {
    fn name(&self) -> &str {
        "arrival"
    }

    async fn consume(&mut self, reading: Reading) -> anyhow::Result<()> {
        // Conditions carry no latency.
        if let Reading::Sample(sample) = &reading {
            self.store.record([sample]).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> anyhow::Result<()> {
        self.store.flush().await?;
        info!(
            "Arrival file {:?} flushed ({} channels)",
            self.store.path(),
            self.store.map().len()
        );
        Ok(())
    }
}
