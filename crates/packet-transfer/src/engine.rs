//! Transport engine contract.
//!
//! An engine runs transfers and reports each one's lifecycle through a
//! [`TransferEvents`] value it owns for the transfer's duration. Events for
//! one transfer are delivered sequentially from one task, which is why the
//! callbacks take `&mut self` and need no locking. Different transfers may
//! run in parallel.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;

use packet_core::{
    AuthChallenge, ChallengeAction, RedirectAction, RedirectProposal, Reply, Request,
    ResponseMeta, TransferError, TransferId,
};

/// Per-transfer event receiver, invoked by the engine.
///
/// Ordering the engine promises (and the bridge tolerates violations of):
/// `on_response` at most once and before any `on_data`; `on_complete` at
/// most once and last; the rest any number of times before completion.
pub trait TransferEvents: Send + 'static {
    fn on_response(&mut self, meta: ResponseMeta);
    fn on_data(&mut self, chunk: Bytes);
    fn on_complete(&mut self, error: Option<TransferError>);
    fn on_redirect(&mut self, proposal: RedirectProposal, reply: Reply<RedirectAction>);
    fn on_challenge(&mut self, challenge: AuthChallenge, reply: Reply<ChallengeAction>);
    fn on_waiting_for_connectivity(&mut self);
}

pub trait TransportEngine: Send + Sync + 'static {
    /// Begin a transfer. Must be called from within a Tokio runtime.
    fn start(&self, id: TransferId, request: Request, events: Box<dyn TransferEvents>);

    /// Ask the engine to stop a transfer. Unknown or finished ids are ignored.
    fn cancel(&self, id: TransferId);
}

/// Wait for a decision, falling back to `default` if the reply was dropped.
pub async fn decision_or_default<T>(rx: oneshot::Receiver<T>, default: T) -> T {
    match rx.await {
        Ok(decision) => decision,
        Err(_) => {
            tracing::warn!("decision reply dropped without an answer, applying default");
            default
        }
    }
}

// ── In-flight table ───────────────────────────────────────────────────────────

/// Cancellation signals for an engine's running transfers.
#[derive(Default)]
pub struct InFlight {
    transfers: DashMap<TransferId, oneshot::Sender<()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a transfer. The receiver fires when `cancel` is called for it.
    pub fn register(&self, id: TransferId) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.transfers.insert(id, tx);
        rx
    }

    /// Signal cancellation. Returns false if the transfer is not running.
    pub fn cancel(&self, id: TransferId) -> bool {
        match self.transfers.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Stop tracking a transfer that ended on its own.
    pub fn finish(&self, id: TransferId) {
        self.transfers.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

// ── Cancel guard ──────────────────────────────────────────────────────────────

/// Cancels an engine transfer on drop unless disarmed first.
pub struct CancelGuard {
    engine: Arc<dyn TransportEngine>,
    id: TransferId,
    armed: bool,
}

impl CancelGuard {
    pub fn new(engine: Arc<dyn TransportEngine>, id: TransferId) -> Self {
        Self {
            engine,
            id,
            armed: true,
        }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn id(&self) -> TransferId {
        self.id
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(transfer = %self.id, "consumer went away, cancelling transfer");
            self.engine.cancel(self.id);
        }
    }
}

impl fmt::Debug for CancelGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelGuard")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}
