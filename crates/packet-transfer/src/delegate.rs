//! External delegate and the passthrough policy.
//!
//! A [`TransferDelegate`] declares, per forwardable event, whether the
//! consumer wants to handle it. [`Passthrough`] forwards an event only when
//! the matching handler is present, and otherwise applies the default action
//! so the transfer keeps moving.
//!
//! Delegates are shared across transfers behind an `Arc` and never mutated
//! after construction.

use std::fmt;
use std::sync::Arc;

use packet_core::{
    AuthChallenge, ChallengeAction, RedirectAction, RedirectProposal, Reply, TransferId,
};

pub type RedirectHandler = Arc<dyn Fn(RedirectProposal, Reply<RedirectAction>) + Send + Sync>;
pub type ChallengeHandler = Arc<dyn Fn(AuthChallenge, Reply<ChallengeAction>) + Send + Sync>;
pub type ConnectivityHandler = Arc<dyn Fn(TransferId) + Send + Sync>;

/// Consumer-supplied handlers. Every handler is optional.
///
/// A handler that receives a [`Reply`] owns the decision: it must answer
/// (now or later, from any thread) or drop the reply, in which case the
/// engine applies its default.
#[derive(Clone, Default)]
pub struct TransferDelegate {
    on_redirect: Option<RedirectHandler>,
    on_challenge: Option<ChallengeHandler>,
    on_waiting_for_connectivity: Option<ConnectivityHandler>,
}

impl TransferDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_redirect<F>(mut self, handler: F) -> Self
    where
        F: Fn(RedirectProposal, Reply<RedirectAction>) + Send + Sync + 'static,
    {
        self.on_redirect = Some(Arc::new(handler));
        self
    }

    pub fn on_challenge<F>(mut self, handler: F) -> Self
    where
        F: Fn(AuthChallenge, Reply<ChallengeAction>) + Send + Sync + 'static,
    {
        self.on_challenge = Some(Arc::new(handler));
        self
    }

    pub fn on_waiting_for_connectivity<F>(mut self, handler: F) -> Self
    where
        F: Fn(TransferId) + Send + Sync + 'static,
    {
        self.on_waiting_for_connectivity = Some(Arc::new(handler));
        self
    }

    pub fn handles_redirect(&self) -> bool {
        self.on_redirect.is_some()
    }

    pub fn handles_challenge(&self) -> bool {
        self.on_challenge.is_some()
    }

    pub fn handles_connectivity(&self) -> bool {
        self.on_waiting_for_connectivity.is_some()
    }
}

impl fmt::Debug for TransferDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferDelegate")
            .field("redirect", &self.handles_redirect())
            .field("challenge", &self.handles_challenge())
            .field("connectivity", &self.handles_connectivity())
            .finish()
    }
}

// ── Passthrough ───────────────────────────────────────────────────────────────

/// Which way an event went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Delegate,
    Default,
}

#[derive(Debug, Clone, Default)]
pub struct Passthrough {
    delegate: Option<Arc<TransferDelegate>>,
}

impl Passthrough {
    pub fn new(delegate: Option<Arc<TransferDelegate>>) -> Self {
        Self { delegate }
    }

    /// Default: follow the proposed request unchanged.
    pub fn redirect(&self, proposal: RedirectProposal, reply: Reply<RedirectAction>) -> Route {
        match self.delegate.as_ref().and_then(|d| d.on_redirect.as_ref()) {
            Some(handler) => {
                handler(proposal, reply);
                Route::Delegate
            }
            None => {
                reply.send(RedirectAction::Follow(proposal.request));
                Route::Default
            }
        }
    }

    /// Default: let the engine handle it, no credential.
    pub fn challenge(&self, challenge: AuthChallenge, reply: Reply<ChallengeAction>) -> Route {
        match self.delegate.as_ref().and_then(|d| d.on_challenge.as_ref()) {
            Some(handler) => {
                handler(challenge, reply);
                Route::Delegate
            }
            None => {
                reply.send(ChallengeAction::PerformDefaultHandling);
                Route::Default
            }
        }
    }

    /// Informational only; the default is to do nothing.
    pub fn waiting_for_connectivity(&self, id: TransferId) -> Route {
        match self
            .delegate
            .as_ref()
            .and_then(|d| d.on_waiting_for_connectivity.as_ref())
        {
            Some(handler) => {
                handler(id);
                Route::Delegate
            }
            None => Route::Default,
        }
    }
}
