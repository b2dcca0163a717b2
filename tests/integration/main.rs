//! Packet integration test harness.
//!
//! Everything runs in-process:
//!
//!   - `mock`:   a scripted transport engine, one script per URL scheme
//!   - `server`: a canned HTTP/1.1 server on 127.0.0.1 for the reqwest engine
//!   - fixtures: generated files under the system temp dir
//!
//!   cargo test --test integration
//!
//! Each test owns its fixtures and servers; nothing is shared between tests
//! except the process-wide shared session.

mod delegate;
mod metadata;
mod streams;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub const FIXTURE_LEN: usize = 100_000;

const IPSUM: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis \
nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.\n";

/// Deterministic text of exactly `len` bytes.
pub fn ipsum(len: usize) -> Vec<u8> {
    IPSUM.iter().copied().cycle().take(len).collect()
}

static FIXTURE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A generated file, removed on drop.
pub struct Fixture {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Fixture {
    pub fn ipsum(len: usize) -> Result<Self> {
        Self::with_bytes(ipsum(len))
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Result<Self> {
        let seq = FIXTURE_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "packet-fixture-{}-{}.txt",
            std::process::id(),
            seq
        ));
        std::fs::write(&path, &bytes)
            .with_context(|| format!("failed to write fixture {}", path.display()))?;
        Ok(Self { path, bytes })
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Drain a stream chunk by chunk, keeping the chunk count.
pub async fn drain(stream: &mut packet_transfer::ChunkStream) -> Result<(Vec<u8>, usize)> {
    let mut body = Vec::new();
    let mut chunks = 0;
    while let Some(chunk) = stream.next_chunk().await.context("stream failed")? {
        body.extend_from_slice(&chunk);
        chunks += 1;
    }
    Ok((body, chunks))
}

/// Poll `check` every 10ms until it holds or `timeout_ms` elapses.
pub async fn wait_until(timeout_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check()
}

#[test]
fn ipsum_is_exact_length_and_stable() {
    let a = ipsum(FIXTURE_LEN);
    assert_eq!(a.len(), FIXTURE_LEN);
    assert_eq!(a, ipsum(FIXTURE_LEN));
    assert!(a.starts_with(b"Lorem ipsum"));
}
