//! Chunked transfer bridge: push-style engine callbacks in, pull-style chunk
//! streams out.

pub mod bridge;
pub mod correlator;
pub mod delegate;
pub mod engine;
pub mod file;
pub mod http;
pub mod local;
pub mod router;
pub mod session;
pub mod sink;

pub use bridge::{BridgeState, Outcome, TransferBridge};
pub use correlator::{handoff, PendingResponse, Resolver};
pub use delegate::{Passthrough, Route, TransferDelegate};
pub use engine::{decision_or_default, CancelGuard, InFlight, TransferEvents, TransportEngine};
pub use file::{file_chunks, reader_chunks};
pub use http::HttpEngine;
pub use local::LocalEngine;
pub use router::SchemeRouter;
pub use session::{resource_chunks, ChunkSession};
pub use sink::{chunk_channel, ChunkSink, ChunkStream};
