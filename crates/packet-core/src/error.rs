//! Terminal transfer errors.
//!
//! One error value is delivered to both the chunk stream consumer and any
//! pending metadata waiter, so the type is `Clone`. Engine-specific errors
//! are flattened to strings at the engine boundary.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The engine reported a network-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("transfer timed out")]
    TimedOut,
    /// Cancelled by the consumer or by a delegate decision.
    #[error("transfer cancelled")]
    Cancelled,
    /// The transfer completed without ever producing response metadata.
    #[error("no response received")]
    NoResponse,
    /// The producer side went away without terminating the transfer.
    #[error("transfer aborted before completion")]
    Aborted,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(u32),
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransferError {
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// True for errors raised on the consumer's behalf rather than by the
    /// remote side.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TransferError::Cancelled | TransferError::Aborted)
    }
}

impl From<std::io::Error> for TransferError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io(error.to_string()),
        }
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
