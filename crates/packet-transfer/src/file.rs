//! Byte sources outside the engine path: any `AsyncRead`, and local files.
//!
//! The pump task reads until end-of-file, an error, or the consumer dropping
//! its stream, whichever comes first.

use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use packet_core::TransferResult;

use crate::sink::{chunk_channel, ChunkSink, ChunkStream};

/// Stream `reader` as chunks of at most `chunk_size` bytes.
pub fn reader_chunks<R>(reader: R, chunk_size: usize) -> ChunkStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (sink, stream) = chunk_channel();
    tokio::spawn(pump(reader, sink, chunk_size.max(1)));
    stream
}

/// Open `path` and stream its contents. Open errors are returned directly;
/// read errors arrive through the stream.
pub async fn file_chunks(path: impl AsRef<Path>, chunk_size: usize) -> TransferResult<ChunkStream> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path).await?;
    tracing::debug!(path = %path.display(), chunk_size, "streaming file");
    Ok(reader_chunks(file, chunk_size))
}

async fn pump<R>(mut reader: R, mut sink: ChunkSink, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = vec![0u8; chunk_size];
        let read = tokio::select! {
            _ = sink.closed() => None,
            read = reader.read(&mut buf) => Some(read),
        };
        match read {
            None => {
                tracing::trace!(bytes = sink.bytes_pushed(), "reader consumer gone");
                sink.finish();
                return;
            }
            Some(Ok(0)) => {
                sink.finish();
                return;
            }
            Some(Ok(n)) => {
                buf.truncate(n);
                if !sink.push(Bytes::from(buf)) {
                    sink.finish();
                    return;
                }
            }
            Some(Err(e)) => {
                sink.finish_with_error(e.into());
                return;
            }
        }
    }
}
