//! Local file engine: serves `file://` URLs and absolute paths.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Url;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;

use packet_core::config::TransferConfig;
use packet_core::{Method, Request, ResponseMeta, TransferError, TransferId, TransferResult};

use crate::engine::{InFlight, TransferEvents, TransportEngine};

#[derive(Clone)]
pub struct LocalEngine {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    chunk_size: usize,
    in_flight: InFlight,
}

impl LocalEngine {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                chunk_size: chunk_size.max(1),
                in_flight: InFlight::new(),
            }),
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.chunk_size)
    }

    /// Transfers currently running.
    pub fn active(&self) -> usize {
        self.inner.in_flight.len()
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

impl TransportEngine for LocalEngine {
    fn start(&self, id: TransferId, request: Request, mut events: Box<dyn TransferEvents>) {
        let mut cancel = self.inner.in_flight.register(id);
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let result = serve(&inner, &request, events.as_mut(), &mut cancel).await;
            if let Err(e) = &result {
                tracing::debug!(transfer = %id, url = %request.url, error = %e, "local transfer failed");
            }
            events.on_complete(result.err());
            inner.in_flight.finish(id);
        });
    }

    fn cancel(&self, id: TransferId) {
        if self.inner.in_flight.cancel(id) {
            tracing::debug!(transfer = %id, "local transfer cancel requested");
        }
    }
}

async fn serve(
    inner: &LocalInner,
    request: &Request,
    events: &mut dyn TransferEvents,
    cancel: &mut oneshot::Receiver<()>,
) -> TransferResult<()> {
    if !matches!(request.method, Method::Get | Method::Head) {
        return Err(TransferError::InvalidRequest(format!(
            "{} is not supported for local files",
            request.method
        )));
    }
    let path = file_path(&request.url)?;

    let mut file = tokio::fs::File::open(&path).await?;
    let len = file.metadata().await?.len();

    let mut meta = ResponseMeta::new(request.url.clone(), 200);
    meta.headers.insert("content-length", len.to_string());
    meta.expected_length = Some(len);
    events.on_response(meta);

    if request.method == Method::Head {
        return Ok(());
    }

    let mut sent = 0u64;
    loop {
        let mut buf = vec![0u8; inner.chunk_size];
        let read = tokio::select! {
            biased;
            _ = &mut *cancel => None,
            read = file.read(&mut buf) => Some(read),
        };
        let n = match read {
            None => return Err(TransferError::Cancelled),
            Some(read) => read?,
        };
        if n == 0 {
            break;
        }
        buf.truncate(n);
        sent += n as u64;
        events.on_data(Bytes::from(buf));
    }

    tracing::trace!(path = %path.display(), bytes = sent, "local file served");
    Ok(())
}

/// Filesystem path for a `file://` URL or an absolute path.
pub fn file_path(url: &str) -> TransferResult<PathBuf> {
    if url.starts_with('/') {
        return Ok(PathBuf::from(url));
    }
    let parsed =
        Url::parse(url).map_err(|e| TransferError::InvalidRequest(format!("{url}: {e}")))?;
    if parsed.scheme() != "file" {
        return Err(TransferError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    parsed
        .to_file_path()
        .map_err(|()| TransferError::InvalidRequest(format!("invalid file URL: {url}")))
}
