//! packet-core — shared request/response types, lifecycle events, errors,
//! and configuration. The transfer crate and the CLI depend on this one.

pub mod config;
pub mod error;
pub mod event;
pub mod request;

pub use error::{TransferError, TransferResult};
pub use event::{
    AuthChallenge, ChallengeAction, Credential, RedirectAction, RedirectProposal, Reply,
    TransferId,
};
pub use request::{Headers, Method, Request, ResponseMeta};
