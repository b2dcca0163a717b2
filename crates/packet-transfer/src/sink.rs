//! Chunk sink: the channel between engine callbacks and the consumer.
//!
//! The producer half ([`ChunkSink`]) is driven from engine callback context
//! and never blocks: the buffer is unbounded. The consumer half
//! ([`ChunkStream`]) is a lazy, single-pass `Stream` of byte chunks that ends
//! with either end-of-data or exactly one error.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{FusedStream, Stream, StreamExt};
use tokio::sync::mpsc;

use packet_core::{TransferError, TransferResult};

use crate::engine::CancelGuard;

pub type ChunkResult = Result<Bytes, TransferError>;

/// Create a connected sink/stream pair.
pub fn chunk_channel() -> (ChunkSink, ChunkStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChunkSink {
            tx: Some(tx),
            pushed: 0,
        },
        ChunkStream {
            rx,
            finished: false,
            received: 0,
            cancel: None,
        },
    )
}

// ── Producer ──────────────────────────────────────────────────────────────────

/// Push side of a chunk channel.
///
/// Termination takes the sender, so every call after `finish` or
/// `finish_with_error` is a no-op. A sink dropped while still open
/// terminates the stream with [`TransferError::Aborted`].
pub struct ChunkSink {
    tx: Option<mpsc::UnboundedSender<ChunkResult>>,
    pushed: u64,
}

impl ChunkSink {
    /// Append a chunk. Returns false if the sink is terminated or the
    /// consumer has gone away. Empty chunks are skipped.
    pub fn push(&mut self, chunk: Bytes) -> bool {
        let Some(tx) = &self.tx else {
            tracing::trace!(len = chunk.len(), "chunk after termination dropped");
            return false;
        };
        if chunk.is_empty() {
            return !tx.is_closed();
        }
        self.pushed += chunk.len() as u64;
        tx.send(Ok(chunk)).is_ok()
    }

    /// Terminate with end-of-data.
    pub fn finish(&mut self) {
        if self.tx.take().is_some() {
            tracing::trace!(bytes = self.pushed, "chunk sink finished");
        }
    }

    /// Terminate with an error. The consumer sees it after any buffered chunks.
    pub fn finish_with_error(&mut self, error: TransferError) {
        if let Some(tx) = self.tx.take() {
            tracing::trace!(bytes = self.pushed, error = %error, "chunk sink failed");
            let _ = tx.send(Err(error));
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.tx.is_none()
    }

    /// True once the consumer dropped its stream (or the sink terminated).
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Resolves when the consumer drops its stream.
    pub async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => {}
        }
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.pushed
    }
}

impl Drop for ChunkSink {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::debug!(bytes = self.pushed, "chunk sink dropped while open");
            let _ = tx.send(Err(TransferError::Aborted));
        }
    }
}

impl fmt::Debug for ChunkSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkSink")
            .field("terminated", &self.is_terminated())
            .field("pushed", &self.pushed)
            .finish()
    }
}

// ── Consumer ──────────────────────────────────────────────────────────────────

/// Pull side of a chunk channel.
///
/// Yields chunks in the order they were pushed. After end-of-data or an
/// error it stays finished: further polls return `None` immediately, nothing
/// is replayed. Dropping an unfinished stream that belongs to an engine
/// transfer cancels that transfer.
pub struct ChunkStream {
    rx: mpsc::UnboundedReceiver<ChunkResult>,
    finished: bool,
    received: u64,
    cancel: Option<CancelGuard>,
}

impl ChunkStream {
    /// Tie this stream to an engine transfer, cancelled if the stream is
    /// dropped before it finishes.
    pub(crate) fn with_cancel(mut self, guard: CancelGuard) -> Self {
        self.cancel = Some(guard);
        self
    }

    /// Detach from the engine transfer; dropping the stream no longer
    /// cancels it.
    pub(crate) fn disarm(&mut self) {
        if let Some(guard) = self.cancel.as_mut() {
            guard.disarm();
        }
    }

    /// Next chunk; `Ok(None)` at end of data.
    pub async fn next_chunk(&mut self) -> TransferResult<Option<Bytes>> {
        self.next().await.transpose()
    }

    /// Drain the stream into one buffer.
    pub async fn collect_bytes(mut self) -> TransferResult<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    /// Bytes handed to the consumer so far.
    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn terminate(&mut self) {
        self.finished = true;
        self.rx.close();
        self.disarm();
    }
}

impl Stream for ChunkStream {
    type Item = ChunkResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.received += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.terminate();
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.terminate();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedStream for ChunkStream {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("finished", &self.finished)
            .field("received", &self.received)
            .field("transfer", &self.cancel.as_ref().map(|g| g.id()))
            .finish()
    }
}
