use async_trait::async_trait;
use sniffwave_common::Reading;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};

use super::Consumer;

/// Writes every reading as one JSON object per line.
pub struct PrintConsumer<W> {
    writer: W,
}

impl PrintConsumer<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> PrintConsumer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> Consumer for PrintConsumer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        "print"
    }

    async fn consume(&mut self, reading: Reading) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&reading)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    async fn finish(&mut self) -> anyhow::Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}
