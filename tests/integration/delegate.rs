use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use packet_core::{ChallengeAction, Credential, RedirectAction, Request, TransferError};
use packet_transfer::TransferDelegate;

use crate::mock::{MockEngine, REDIRECT_TARGET};

// ══════════════════════════════════════════════════════════════════════════════
//  Redirects
// ══════════════════════════════════════════════════════════════════════════════

/// Without a delegate the redirect is followed unchanged.
#[tokio::test]
async fn test_redirect_followed_by_default() -> Result<()> {
    let engine = MockEngine::new();
    let body = engine
        .session()
        .chunks_for_url("redirect://start")
        .collect_bytes()
        .await?;

    assert_eq!(&body[..], b"redirected");
    assert_eq!(engine.issued(), vec!["redirect://start", REDIRECT_TARGET]);
    Ok(())
}

#[tokio::test]
async fn test_refused_redirect_delivers_the_redirect_response() -> Result<()> {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_redirect(|_, reply| {
        reply.send(RedirectAction::Refuse);
    });

    let (stream, meta) = engine
        .session()
        .open_chunk_stream_with_metadata(Request::get("redirect://start"), Some(Arc::new(delegate)))
        .await?;
    assert_eq!(meta.status, 302);
    assert_eq!(meta.headers.get("location"), Some(REDIRECT_TARGET));
    assert!(stream.collect_bytes().await?.is_empty());
    assert_eq!(engine.issued(), vec!["redirect://start"]);
    Ok(())
}

#[tokio::test]
async fn test_delegate_can_rewrite_redirect_target() -> Result<()> {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_redirect(|proposal, reply| {
        assert_eq!(proposal.response.status, 302);
        assert_eq!(proposal.request.url, REDIRECT_TARGET);
        reply.send(RedirectAction::Follow(Request::get("https://mirror.example/")));
    });

    let body = engine
        .session()
        .open_chunk_stream(Request::get("redirect://start"), Some(Arc::new(delegate)))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"redirected");
    assert_eq!(engine.issued()[1], "https://mirror.example/");
    Ok(())
}

/// A handler may answer later, from another thread.
#[tokio::test]
async fn test_redirect_answered_from_another_thread() -> Result<()> {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_redirect(|proposal, reply| {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            reply.send(RedirectAction::Follow(proposal.request));
        });
    });

    let body = engine
        .session()
        .open_chunk_stream(Request::get("redirect://start"), Some(Arc::new(delegate)))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"redirected");
    Ok(())
}

/// A handler that drops the reply gets the default action.
#[tokio::test]
async fn test_dropped_redirect_reply_follows() -> Result<()> {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_redirect(|_, reply| drop(reply));

    let body = engine
        .session()
        .open_chunk_stream(Request::get("redirect://start"), Some(Arc::new(delegate)))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"redirected");
    assert_eq!(engine.issued().len(), 2);
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Authentication challenges
// ══════════════════════════════════════════════════════════════════════════════

/// Without a delegate the challenge gets default handling and completes.
#[tokio::test]
async fn test_challenge_default_handling_completes() -> Result<()> {
    let engine = MockEngine::new();
    let body = engine
        .session()
        .chunks_for_url("authenticate://vault")
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"anonymous");
    Ok(())
}

#[tokio::test]
async fn test_challenge_answered_with_credential() -> Result<()> {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_challenge(|challenge, reply| {
        assert_eq!(challenge.host, "vault");
        assert_eq!(challenge.realm.as_deref(), Some("mock"));
        reply.send(ChallengeAction::UseCredential(Credential::new("ann", "s3cret")));
    });

    let body = engine
        .session()
        .open_chunk_stream(Request::get("authenticate://vault"), Some(Arc::new(delegate)))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"welcome ann");
    Ok(())
}

#[tokio::test]
async fn test_cancelled_challenge_fails_transfer() {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_challenge(|_, reply| {
        reply.send(ChallengeAction::CancelChallenge);
    });

    let result = engine
        .session()
        .open_chunk_stream_with_metadata(
            Request::get("authenticate://vault"),
            Some(Arc::new(delegate)),
        )
        .await;
    assert_eq!(result.unwrap_err(), TransferError::Cancelled);
}

#[tokio::test]
async fn test_rejected_challenge_delivers_unauthorized() -> Result<()> {
    let engine = MockEngine::new();
    let delegate = TransferDelegate::new().on_challenge(|_, reply| {
        reply.send(ChallengeAction::RejectProtectionSpace);
    });

    let (_stream, meta) = engine
        .session()
        .open_chunk_stream_with_metadata(
            Request::get("authenticate://vault"),
            Some(Arc::new(delegate)),
        )
        .await?;
    assert_eq!(meta.status, 401);
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Partial delegates and connectivity
// ══════════════════════════════════════════════════════════════════════════════

/// A delegate that only handles redirects still lets challenges through.
#[tokio::test]
async fn test_partial_delegate_gets_defaults_for_the_rest() -> Result<()> {
    let engine = MockEngine::new();
    let redirects = Arc::new(AtomicUsize::new(0));
    let seen = redirects.clone();
    let delegate = Arc::new(TransferDelegate::new().on_redirect(move |proposal, reply| {
        seen.fetch_add(1, Ordering::SeqCst);
        reply.send(RedirectAction::Follow(proposal.request));
    }));
    let session = engine.session();

    let body = session
        .open_chunk_stream(Request::get("authenticate://vault"), Some(delegate.clone()))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"anonymous");
    assert_eq!(redirects.load(Ordering::SeqCst), 0);

    let body = session
        .open_chunk_stream(Request::get("redirect://start"), Some(delegate))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"redirected");
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_connectivity_wait_is_reported_once() -> Result<()> {
    let engine = MockEngine::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    let delegate = TransferDelegate::new().on_waiting_for_connectivity(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let body = engine
        .session()
        .open_chunk_stream(Request::get("offline://x"), Some(Arc::new(delegate)))
        .collect_bytes()
        .await?;
    assert_eq!(&body[..], b"online");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Without a handler the event is absorbed.
    let body = engine.session().chunks_for_url("offline://x").collect_bytes().await?;
    assert_eq!(&body[..], b"online");
    Ok(())
}
