//! `fetch`: stream a URL through the standard scheme router.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use packet_core::config::PacketConfig;
use packet_core::{ChallengeAction, Credential, RedirectAction, Request, ResponseMeta};
use packet_transfer::{ChunkSession, SchemeRouter, TransferDelegate};

use super::output;

#[derive(Debug, Default)]
pub struct FetchOptions {
    output: Option<String>,
    meta: bool,
    json: bool,
    hash: bool,
    no_redirect: bool,
    user: Option<Credential>,
}

impl FetchOptions {
    pub fn parse(args: &[&str]) -> Result<Self> {
        let mut options = FetchOptions::default();
        let mut i = 0;
        while i < args.len() {
            match args[i] {
                "-o" | "--output" => {
                    i += 1;
                    options.output = Some(args.get(i).context("-o requires a path")?.to_string());
                }
                "--meta" => options.meta = true,
                "--json" => {
                    options.meta = true;
                    options.json = true;
                }
                "--hash" => options.hash = true,
                "--no-redirect" => options.no_redirect = true,
                "--user" => {
                    i += 1;
                    let value = args.get(i).context("--user requires user:password")?;
                    let (user, password) = value
                        .split_once(':')
                        .context("--user must be user:password")?;
                    options.user = Some(Credential::new(user, password));
                }
                other => bail!("unknown fetch option: {}", other),
            }
            i += 1;
        }
        Ok(options)
    }
}

fn delegate(options: &FetchOptions) -> TransferDelegate {
    let mut delegate = TransferDelegate::new().on_waiting_for_connectivity(|id| {
        tracing::warn!(transfer = %id, "waiting for network connectivity");
    });

    if options.no_redirect {
        delegate = delegate.on_redirect(|proposal, reply| {
            tracing::info!(to = %proposal.request.url, "refusing redirect");
            reply.send(RedirectAction::Refuse);
        });
    }

    if let Some(credential) = options.user.clone() {
        delegate = delegate.on_challenge(move |challenge, reply| {
            // Offer the credential once, reject on later rounds.
            let action = if challenge.previous_failures == 0 {
                ChallengeAction::UseCredential(credential.clone())
            } else {
                ChallengeAction::RejectProtectionSpace
            };
            reply.send(action);
        });
    }

    delegate
}

#[derive(Serialize)]
struct MetaReport<'a> {
    url: &'a str,
    status: u16,
    expected_length: Option<u64>,
    headers: Vec<(&'a str, &'a str)>,
}

fn print_meta(meta: &ResponseMeta, json: bool) -> Result<()> {
    if json {
        let report = MetaReport {
            url: &meta.url,
            status: meta.status,
            expected_length: meta.expected_length,
            headers: meta.headers.iter().collect(),
        };
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    eprintln!("{} {}", meta.status, meta.url);
    for (name, value) in meta.headers.iter() {
        eprintln!("{}: {}", name, value);
    }
    eprintln!();
    Ok(())
}

pub async fn cmd_fetch(config: &PacketConfig, url: &str, options: FetchOptions) -> Result<()> {
    let session = ChunkSession::new(Arc::new(SchemeRouter::standard(config)));
    let request = Request::get(url);
    let delegate = Some(Arc::new(delegate(&options)));

    let stream = if options.meta {
        let (stream, meta) = session
            .open_chunk_stream_with_metadata(request, delegate)
            .await
            .with_context(|| format!("failed to fetch {}", url))?;
        print_meta(&meta, options.json)?;
        stream
    } else {
        session.open_chunk_stream(request, delegate)
    };

    let summary = output::drain(stream, options.output.as_deref(), options.hash)
        .await
        .with_context(|| format!("failed to fetch {}", url))?;
    tracing::info!(url, bytes = summary.bytes, chunks = summary.chunks, "fetch complete");

    output::print_digest(&summary, url, options.output.is_none());
    Ok(())
}
