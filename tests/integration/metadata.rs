use std::sync::Arc;

use anyhow::Result;

use packet_core::{Request, TransferError};
use packet_transfer::{ChunkSession, LocalEngine};

use crate::mock::MockEngine;
use crate::{drain, Fixture, FIXTURE_LEN};

// ══════════════════════════════════════════════════════════════════════════════
//  Metadata-first variant
// ══════════════════════════════════════════════════════════════════════════════

/// Metadata arrives before any of the body has been consumed.
#[tokio::test]
async fn test_metadata_precedes_body() -> Result<()> {
    let engine = MockEngine::new();
    let (mut stream, meta) = engine
        .session()
        .open_chunk_stream_with_metadata(Request::get("bytes://5000"), None)
        .await?;

    assert_eq!(meta.status, 200);
    assert_eq!(meta.expected_length, Some(5000));
    assert_eq!(meta.headers.get("content-length"), Some("5000"));
    assert_eq!(stream.bytes_received(), 0);

    let (body, _) = drain(&mut stream).await?;
    assert_eq!(body, crate::ipsum(5000));
    Ok(())
}

#[tokio::test]
async fn test_metadata_for_local_fixture() -> Result<()> {
    let fixture = Fixture::ipsum(FIXTURE_LEN)?;
    let session = ChunkSession::new(Arc::new(LocalEngine::default()));

    let (stream, meta) = session
        .open_chunk_stream_with_metadata(Request::get(fixture.url()), None)
        .await?;
    assert_eq!(meta.url, fixture.url());
    assert_eq!(meta.expected_length, Some(FIXTURE_LEN as u64));

    let body = stream.collect_bytes().await?;
    assert_eq!(&body[..], &fixture.bytes[..]);
    Ok(())
}

/// Successful completion with no response at all is an error for the
/// metadata variant but just an empty body for the plain one.
#[tokio::test]
async fn test_completion_without_metadata() {
    let engine = MockEngine::new();
    let session = engine.session();

    let err = session
        .open_chunk_stream_with_metadata(Request::get("nometa://x"), None)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::NoResponse);

    let body = session.chunks_for_url("nometa://x").collect_bytes().await;
    assert_eq!(body.map(|b| b.len()), Ok(0));
}

#[tokio::test]
async fn test_metadata_variant_sees_transport_error() {
    let engine = MockEngine::new();
    let err = engine
        .session()
        .open_chunk_stream_with_metadata(Request::get("error://x"), None)
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::transport("error requested"));
}

/// A transfer that ends before its metadata is not cancelled by the bridge
/// discarding the parked stream.
#[tokio::test]
async fn test_early_completion_sends_no_cancel() {
    let engine = MockEngine::new();
    let session = engine.session();

    for url in ["error://x", "nometa://x"] {
        let result = session
            .open_chunk_stream_with_metadata(Request::get(url), None)
            .await;
        assert!(result.is_err(), "{url} should fail the metadata waiter");
    }
    assert!(crate::wait_until(500, || engine.running() == 0).await);
    assert!(engine.cancelled().is_empty());
}

/// An error after metadata reaches the stream, not the metadata waiter.
#[tokio::test]
async fn test_error_after_metadata_reaches_stream() -> Result<()> {
    let engine = MockEngine::new();
    let (mut stream, meta) = engine
        .session()
        .open_chunk_stream_with_metadata(Request::get("stall://x"), None)
        .await?;
    assert_eq!(meta.status, 200);
    assert_eq!(stream.next_chunk().await?.as_deref(), Some(&b"first"[..]));

    // Cancelling through the engine ends the stream with the engine's error.
    engine.cancel_all();
    assert_eq!(stream.next_chunk().await, Err(TransferError::Cancelled));
    Ok(())
}
