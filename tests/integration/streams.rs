use std::sync::Arc;

use anyhow::Result;
use futures::stream::{FusedStream, StreamExt, TryStreamExt};

use packet_core::{Request, TransferError};
use packet_transfer::{
    file_chunks, reader_chunks, resource_chunks, ChunkSession, LocalEngine, SchemeRouter,
};

use crate::mock::MockEngine;
use crate::{drain, Fixture, FIXTURE_LEN};

// ══════════════════════════════════════════════════════════════════════════════
//  Chunk streams
// ══════════════════════════════════════════════════════════════════════════════

/// The 100k fixture arrives complete and in order through the plain variant.
#[tokio::test]
async fn test_fixture_streams_exact_bytes() -> Result<()> {
    let fixture = Fixture::ipsum(FIXTURE_LEN)?;
    let session = ChunkSession::new(Arc::new(LocalEngine::new(8 * 1024)));

    let mut stream = session.open_chunk_stream(Request::get(fixture.url()), None);
    let (body, chunks) = drain(&mut stream).await?;

    assert_eq!(body.len(), FIXTURE_LEN);
    assert_eq!(body, fixture.bytes);
    assert!(chunks >= FIXTURE_LEN / (8 * 1024));
    assert_eq!(stream.bytes_received(), FIXTURE_LEN as u64);
    Ok(())
}

#[tokio::test]
async fn test_resource_chunks_uses_shared_session() -> Result<()> {
    let fixture = Fixture::ipsum(FIXTURE_LEN)?;
    let body = resource_chunks(fixture.url()).collect_bytes().await?;
    assert_eq!(&body[..], &fixture.bytes[..]);

    // Absolute paths route to the file engine as well.
    let body = resource_chunks(fixture.path.display().to_string())
        .collect_bytes()
        .await?;
    assert_eq!(body.len(), FIXTURE_LEN);
    Ok(())
}

#[tokio::test]
async fn test_stream_is_a_futures_stream() -> Result<()> {
    let engine = MockEngine::new();
    let stream = engine.session().chunks_for_url("bytes://20000");

    let body = stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?;
    assert_eq!(body, crate::ipsum(20_000));
    Ok(())
}

/// A finished stream stays finished: no replay, no restart.
#[tokio::test]
async fn test_stream_does_not_restart() -> Result<()> {
    let engine = MockEngine::new();
    let mut stream = engine.session().chunks_for_url("bytes://10");

    let (body, _) = drain(&mut stream).await?;
    assert_eq!(body.len(), 10);
    assert!(stream.is_terminated());
    assert_eq!(stream.next_chunk().await, Ok(None));
    assert!(stream.next().await.is_none());
    assert_eq!(engine.issued().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_file_and_reader_sources() -> Result<()> {
    let fixture = Fixture::ipsum(FIXTURE_LEN)?;

    let from_file = file_chunks(&fixture.path, 4096).await?.collect_bytes().await?;
    assert_eq!(&from_file[..], &fixture.bytes[..]);

    let reader = tokio::fs::File::open(&fixture.path).await?;
    let mut stream = reader_chunks(reader, 1000);
    let (body, chunks) = drain(&mut stream).await?;
    assert_eq!(body, fixture.bytes);
    assert!(chunks >= FIXTURE_LEN / 1000);
    Ok(())
}

#[tokio::test]
async fn test_missing_file_fails_with_io_error() {
    let session = ChunkSession::new(Arc::new(LocalEngine::default()));
    let result = session
        .chunks_for_url("file:///no/such/packet/fixture.txt")
        .collect_bytes()
        .await;
    assert!(matches!(result, Err(TransferError::Io(_))));
}

#[tokio::test]
async fn test_parallel_transfers_stay_separate() -> Result<()> {
    let engine = MockEngine::new();
    let session = engine.session();

    let sizes = [1usize, 4096, 4097, 50_000, 0, 123_456];
    let streams = sizes
        .iter()
        .map(|n| session.chunks_for_url(format!("bytes://{n}")).collect_bytes());
    let bodies = futures::future::try_join_all(streams).await?;

    for (n, body) in sizes.iter().zip(bodies) {
        assert_eq!(&body[..], &crate::ipsum(*n)[..]);
    }
    Ok(())
}

#[tokio::test]
async fn test_router_mixes_engines_in_one_session() -> Result<()> {
    let fixture = Fixture::ipsum(2048)?;
    let engine = MockEngine::new();
    let router = SchemeRouter::new()
        .route("file", Arc::new(LocalEngine::default()))
        .route("bytes", Arc::new(engine.clone()));
    let session = ChunkSession::new(Arc::new(router));

    let local = session.chunks_for_url(fixture.url()).collect_bytes().await?;
    let mocked = session.chunks_for_url("bytes://512").collect_bytes().await?;
    assert_eq!(local.len(), 2048);
    assert_eq!(mocked.len(), 512);

    let refused = session.chunks_for_url("redirect://x").collect_bytes().await;
    assert_eq!(refused, Err(TransferError::UnsupportedScheme("redirect".into())));
    assert_eq!(engine.issued(), vec!["bytes://512".to_string()]);
    Ok(())
}
