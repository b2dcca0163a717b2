//! Transfer bridge: turns one transfer's engine callbacks into chunk sink
//! operations, correlator outcomes, and delegate calls.
//!
//! State machine:
//!
//! ```text
//!   Started ──metadata──▶ Streaming ──complete──▶ Terminated(outcome)
//!      └───────────────────complete──────────────────▲
//! ```
//!
//! The plain variant starts in `Streaming`. Once terminated, every further
//! callback is ignored.

use std::sync::Arc;

use bytes::Bytes;

use packet_core::{
    AuthChallenge, ChallengeAction, RedirectAction, RedirectProposal, Reply, ResponseMeta,
    TransferError, TransferId,
};

use crate::correlator::Resolver;
use crate::delegate::{Passthrough, TransferDelegate};
use crate::engine::TransferEvents;
use crate::sink::{ChunkSink, ChunkStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    Started,
    Streaming,
    Terminated(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(TransferError),
}

/// Stream parked until the metadata arrives.
struct Handoff {
    resolver: Resolver,
    stream: ChunkStream,
}

pub struct TransferBridge {
    id: TransferId,
    state: BridgeState,
    sink: ChunkSink,
    handoff: Option<Handoff>,
    passthrough: Passthrough,
    metadata_seen: bool,
}

impl TransferBridge {
    /// Bridge for a plain chunk stream; no metadata handoff.
    pub fn plain(id: TransferId, sink: ChunkSink, delegate: Option<Arc<TransferDelegate>>) -> Self {
        Self {
            id,
            state: BridgeState::Streaming,
            sink,
            handoff: None,
            passthrough: Passthrough::new(delegate),
            metadata_seen: false,
        }
    }

    /// Bridge for the metadata-first variant. `stream` is handed to the
    /// consumer through `resolver` when the metadata arrives.
    pub fn with_handoff(
        id: TransferId,
        sink: ChunkSink,
        stream: ChunkStream,
        resolver: Resolver,
        delegate: Option<Arc<TransferDelegate>>,
    ) -> Self {
        Self {
            id,
            state: BridgeState::Started,
            sink,
            handoff: Some(Handoff { resolver, stream }),
            passthrough: Passthrough::new(delegate),
            metadata_seen: false,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    fn is_terminated(&self) -> bool {
        matches!(self.state, BridgeState::Terminated(_))
    }

    fn ignored(&self, event: &'static str) {
        tracing::debug!(transfer = %self.id, event, "event after completion ignored");
    }
}

impl TransferEvents for TransferBridge {
    fn on_response(&mut self, meta: ResponseMeta) {
        if self.is_terminated() {
            return self.ignored("response");
        }
        if self.metadata_seen {
            tracing::warn!(transfer = %self.id, status = meta.status, "duplicate response metadata ignored");
            return;
        }
        self.metadata_seen = true;
        tracing::debug!(
            transfer = %self.id,
            status = meta.status,
            url = %meta.url,
            expected = ?meta.expected_length,
            "response metadata received"
        );

        if let Some(Handoff { mut resolver, stream }) = self.handoff.take() {
            resolver.resolve(stream, meta);
        }
        self.state = BridgeState::Streaming;
    }

    fn on_data(&mut self, chunk: Bytes) {
        if self.is_terminated() {
            return self.ignored("data");
        }
        let len = chunk.len();
        if !self.sink.push(chunk) {
            tracing::trace!(transfer = %self.id, len, "consumer gone, chunk discarded");
            return;
        }
        tracing::trace!(transfer = %self.id, len, total = self.sink.bytes_pushed(), "chunk received");
    }

    fn on_complete(&mut self, error: Option<TransferError>) {
        if self.is_terminated() {
            tracing::warn!(transfer = %self.id, error = ?error, "duplicate completion ignored");
            return;
        }

        let outcome = match error {
            None => {
                self.sink.finish();
                if let Some(Handoff { mut resolver, mut stream }) = self.handoff.take() {
                    stream.disarm();
                    tracing::warn!(transfer = %self.id, "transfer completed without response metadata");
                    resolver.fail(TransferError::NoResponse);
                }
                Outcome::Success
            }
            Some(error) => {
                self.sink.finish_with_error(error.clone());
                if let Some(Handoff { mut resolver, mut stream }) = self.handoff.take() {
                    stream.disarm();
                    resolver.fail(error.clone());
                }
                Outcome::Failed(error)
            }
        };

        match &outcome {
            Outcome::Success => tracing::debug!(
                transfer = %self.id,
                bytes = self.sink.bytes_pushed(),
                "transfer completed"
            ),
            Outcome::Failed(error) => tracing::debug!(
                transfer = %self.id,
                bytes = self.sink.bytes_pushed(),
                error = %error,
                "transfer failed"
            ),
        }
        self.state = BridgeState::Terminated(outcome);
    }

    fn on_redirect(&mut self, proposal: RedirectProposal, reply: Reply<RedirectAction>) {
        if self.is_terminated() {
            return self.ignored("redirect");
        }
        let target = proposal.request.url.clone();
        let route = self.passthrough.redirect(proposal, reply);
        tracing::debug!(transfer = %self.id, target = %target, ?route, "redirect proposed");
    }

    fn on_challenge(&mut self, challenge: AuthChallenge, reply: Reply<ChallengeAction>) {
        if self.is_terminated() {
            return self.ignored("challenge");
        }
        let host = challenge.host.clone();
        let route = self.passthrough.challenge(challenge, reply);
        tracing::debug!(transfer = %self.id, host = %host, ?route, "authentication challenge");
    }

    fn on_waiting_for_connectivity(&mut self) {
        if self.is_terminated() {
            return self.ignored("connectivity");
        }
        let route = self.passthrough.waiting_for_connectivity(self.id);
        tracing::debug!(transfer = %self.id, ?route, "waiting for connectivity");
    }
}
