//! Response correlator: one-shot handoff of (stream, metadata).
//!
//! Used by the metadata-first variant. The bridge holds the [`Resolver`] and
//! the consumer awaits the [`PendingResponse`]. The consumer only receives
//! the chunk stream through this handoff, so it cannot start draining the
//! body before the metadata is known.

use tokio::sync::oneshot;

use packet_core::{ResponseMeta, TransferError, TransferResult};

use crate::engine::CancelGuard;
use crate::sink::ChunkStream;

pub type Ready = TransferResult<(ChunkStream, ResponseMeta)>;

pub fn handoff() -> (Resolver, PendingResponse) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver { tx: Some(tx) },
        PendingResponse { rx, cancel: None },
    )
}

/// Producer half. Settles at most once; later attempts are logged and ignored.
#[derive(Debug)]
pub struct Resolver {
    tx: Option<oneshot::Sender<Ready>>,
}

impl Resolver {
    /// Returns false if the correlator had already settled.
    pub fn resolve(&mut self, stream: ChunkStream, meta: ResponseMeta) -> bool {
        self.settle(Ok((stream, meta)))
    }

    pub fn fail(&mut self, error: TransferError) -> bool {
        self.settle(Err(error))
    }

    pub fn is_pending(&self) -> bool {
        self.tx.is_some()
    }

    fn settle(&mut self, outcome: Ready) -> bool {
        let Some(tx) = self.tx.take() else {
            tracing::error!("response correlator already settled, ignoring second outcome");
            return false;
        };
        if tx.send(outcome).is_err() {
            // The stream inside the outcome drops here and cancels the transfer.
            tracing::debug!("metadata waiter gone before handoff");
        }
        true
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(TransferError::Aborted));
        }
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Ready>,
    cancel: Option<CancelGuard>,
}

impl PendingResponse {
    /// Cancel the transfer if this waiter is dropped before it settles.
    pub(crate) fn with_cancel(mut self, guard: CancelGuard) -> Self {
        self.cancel = Some(guard);
        self
    }

    /// Wait for the stream and metadata, or the transfer's terminal error.
    pub async fn ready(mut self) -> Ready {
        let outcome = match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransferError::Aborted),
        };
        // From here the handed-over stream owns cancellation.
        if let Some(guard) = self.cancel.as_mut() {
            guard.disarm();
        }
        outcome
    }
}
