//! Shared output helpers: drain a chunk stream into stdout or a file.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use packet_transfer::ChunkStream;

#[derive(Debug, Default)]
pub struct Summary {
    pub bytes: u64,
    pub chunks: u64,
    pub digest: Option<blake3::Hash>,
}

/// Write every chunk to `target` (stdout when `None`), hashing on the way
/// if asked to.
pub async fn drain(mut stream: ChunkStream, target: Option<&str>, hash: bool) -> Result<Summary> {
    let mut out: Box<dyn AsyncWrite + Unpin + Send> = match target {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let mut hasher = hash.then(blake3::Hasher::new);
    let mut summary = Summary::default();

    while let Some(chunk) = stream.try_next().await.context("transfer failed")? {
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        out.write_all(&chunk)
            .await
            .context("failed to write output")?;
        summary.bytes += chunk.len() as u64;
        summary.chunks += 1;
    }
    out.flush().await.context("failed to flush output")?;

    summary.digest = hasher.map(|hasher| hasher.finalize());
    Ok(summary)
}

/// `<hex digest>  <label>`, as `b3sum` prints it.
fn digest_line(summary: &Summary, label: &str) -> Option<String> {
    summary
        .digest
        .map(|digest| format!("{}  {}", digest.to_hex(), label))
}

/// Print a digest line. Goes to stderr when the body went to stdout.
pub fn print_digest(summary: &Summary, label: &str, body_on_stdout: bool) {
    let Some(line) = digest_line(summary, label) else {
        return;
    };
    if body_on_stdout {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}
