//! `cat`: stream a local file without going through an engine.

use anyhow::{Context, Result};
use packet_core::config::PacketConfig;
use packet_transfer::file_chunks;

use super::output;

pub async fn cmd_cat(config: &PacketConfig, path: &str) -> Result<()> {
    let stream = file_chunks(path, config.transfer.chunk_size)
        .await
        .with_context(|| format!("failed to open {}", path))?;
    let summary = output::drain(stream, None, false).await?;
    tracing::debug!(path, bytes = summary.bytes, chunks = summary.chunks, "cat complete");
    Ok(())
}
