//! Lifecycle event payloads and decision replies.
//!
//! Redirects and authentication challenges need an answer from the bridge
//! (or from the consumer's delegate) before the engine can continue. The
//! engine hands out a [`Reply`] for each such event and awaits the paired
//! receiver; whoever ends up holding the reply answers it exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;

use crate::request::{Request, ResponseMeta};

// ── TransferId ───────────────────────────────────────────────────────────────

/// Process-unique transfer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

static NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(1);

impl TransferId {
    pub fn next() -> Self {
        Self(NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Reply ────────────────────────────────────────────────────────────────────

/// Engine-provided decision callback for one event.
///
/// Consumed by `send`, so a decision can only be made once. Dropping a reply
/// without sending is allowed; engines then apply their default action.
pub struct Reply<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Reply<T> {
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Deliver the decision. Returns false if the engine stopped waiting.
    pub fn send(self, decision: T) -> bool {
        self.tx.send(decision).is_ok()
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ── Redirects ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectProposal {
    /// The 3xx response that triggered the redirect.
    pub response: ResponseMeta,
    /// The request the engine will issue if the redirect is followed.
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    /// Issue this request (the proposal, or a modified one).
    Follow(Request),
    /// Stop here and deliver the redirect response as the final response.
    Refuse,
}

// ── Authentication ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub host: String,
    pub port: u16,
    /// Authentication scheme from the challenge, e.g. `Basic`.
    pub scheme: String,
    pub realm: Option<String>,
    /// How many credentials were already rejected for this transfer.
    pub previous_failures: u32,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

impl Credential {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeAction {
    UseCredential(Credential),
    /// Let the engine handle the challenge without injecting a credential.
    PerformDefaultHandling,
    /// Abort the transfer.
    CancelChallenge,
    /// Decline this protection space; the engine treats it like default handling.
    RejectProtectionSpace,
}
