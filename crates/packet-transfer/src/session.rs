//! Consumer surface: open a transfer and get chunks (and optionally the
//! response metadata first).

use std::sync::{Arc, OnceLock};

use packet_core::config::PacketConfig;
use packet_core::{Request, ResponseMeta, TransferId, TransferResult};

use crate::bridge::TransferBridge;
use crate::correlator::handoff;
use crate::delegate::TransferDelegate;
use crate::engine::{CancelGuard, TransportEngine};
use crate::router::SchemeRouter;
use crate::sink::{chunk_channel, ChunkStream};

/// Opens chunked transfers on one transport engine.
///
/// All methods spawn engine work and must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct ChunkSession {
    engine: Arc<dyn TransportEngine>,
}

impl ChunkSession {
    pub fn new(engine: Arc<dyn TransportEngine>) -> Self {
        Self { engine }
    }

    /// Session over the standard scheme router with default configuration.
    pub fn shared() -> &'static ChunkSession {
        static SHARED: OnceLock<ChunkSession> = OnceLock::new();
        SHARED.get_or_init(|| {
            ChunkSession::new(Arc::new(SchemeRouter::standard(&PacketConfig::default())))
        })
    }

    pub fn engine(&self) -> &Arc<dyn TransportEngine> {
        &self.engine
    }

    /// Start a transfer and return its body as a chunk stream.
    pub fn open_chunk_stream(
        &self,
        request: Request,
        delegate: Option<Arc<TransferDelegate>>,
    ) -> ChunkStream {
        let id = TransferId::next();
        tracing::debug!(transfer = %id, method = %request.method, url = %request.url, "opening chunk stream");

        let (sink, stream) = chunk_channel();
        let stream = stream.with_cancel(CancelGuard::new(self.engine.clone(), id));
        let bridge = TransferBridge::plain(id, sink, delegate);
        self.engine.start(id, request, Box::new(bridge));
        stream
    }

    /// Start a transfer and wait for its response metadata. The body stream
    /// is handed over together with the metadata, before the body is read.
    pub async fn open_chunk_stream_with_metadata(
        &self,
        request: Request,
        delegate: Option<Arc<TransferDelegate>>,
    ) -> TransferResult<(ChunkStream, ResponseMeta)> {
        let id = TransferId::next();
        tracing::debug!(transfer = %id, method = %request.method, url = %request.url, "opening chunk stream with metadata");

        let (sink, stream) = chunk_channel();
        let stream = stream.with_cancel(CancelGuard::new(self.engine.clone(), id));
        let (resolver, pending) = handoff();
        let pending = pending.with_cancel(CancelGuard::new(self.engine.clone(), id));

        let bridge = TransferBridge::with_handoff(id, sink, stream, resolver, delegate);
        self.engine.start(id, request, Box::new(bridge));
        pending.ready().await
    }

    /// GET `url` with no delegate.
    pub fn chunks_for_url(&self, url: impl Into<String>) -> ChunkStream {
        self.open_chunk_stream(Request::get(url), None)
    }
}

/// The resource at `url` as a chunk stream, via the shared session.
pub fn resource_chunks(url: impl Into<String>) -> ChunkStream {
    ChunkSession::shared().chunks_for_url(url)
}
