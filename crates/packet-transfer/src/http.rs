//! HTTP engine on `reqwest`.
//!
//! The client never follows redirects or answers challenges by itself: each
//! 3xx and 401 goes through the transfer's events, and the engine acts on
//! the decision that comes back.

use std::sync::Arc;

use reqwest::{Client, Url};
use tokio::time::Instant;

use packet_core::config::HttpConfig;
use packet_core::{
    AuthChallenge, ChallengeAction, Credential, Method, RedirectAction, RedirectProposal, Reply,
    Request, ResponseMeta, TransferError, TransferId, TransferResult,
};

use crate::engine::{decision_or_default, InFlight, TransferEvents, TransportEngine};

#[derive(Clone)]
pub struct HttpEngine {
    inner: Arc<HttpInner>,
}

struct HttpInner {
    client: Client,
    config: HttpConfig,
    in_flight: InFlight,
}

impl HttpEngine {
    pub fn new(config: &HttpConfig) -> TransferResult<Self> {
        let mut builder = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(map_reqwest)?;

        Ok(Self {
            inner: Arc::new(HttpInner {
                client,
                config: config.clone(),
                in_flight: InFlight::new(),
            }),
        })
    }

    pub fn active(&self) -> usize {
        self.inner.in_flight.len()
    }
}

impl TransportEngine for HttpEngine {
    fn start(&self, id: TransferId, request: Request, mut events: Box<dyn TransferEvents>) {
        let mut cancel = self.inner.in_flight.register(id);
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let url = request.url.clone();
            let result = tokio::select! {
                biased;
                _ = &mut cancel => Err(TransferError::Cancelled),
                result = run(&inner, id, request, events.as_mut()) => result,
            };
            match &result {
                Ok(()) => tracing::debug!(transfer = %id, url = %url, "http transfer finished"),
                Err(e) => tracing::debug!(transfer = %id, url = %url, error = %e, "http transfer failed"),
            }
            events.on_complete(result.err());
            inner.in_flight.finish(id);
        });
    }

    fn cancel(&self, id: TransferId) {
        if self.inner.in_flight.cancel(id) {
            tracing::debug!(transfer = %id, "http transfer cancel requested");
        }
    }
}

/// Per-transfer retry bookkeeping.
#[derive(Default)]
struct Attempts {
    redirects: u32,
    auth_failures: u32,
    credential: Option<Credential>,
    announced_offline: bool,
}

async fn run(
    inner: &HttpInner,
    id: TransferId,
    request: Request,
    events: &mut dyn TransferEvents,
) -> TransferResult<()> {
    let config = &inner.config;
    let mut current = request;
    let mut attempts = Attempts::default();

    let (mut response, meta) = loop {
        let response = send(inner, id, &current, &mut attempts, events).await?;
        let meta = response_meta(&response);

        if meta.is_redirect() {
            if let Some(location) = meta.headers.get("location") {
                let next = redirect_request(&current, meta.status, location)?;
                if attempts.redirects >= config.max_redirects {
                    return Err(TransferError::TooManyRedirects(config.max_redirects));
                }
                attempts.redirects += 1;

                let (reply, rx) = Reply::channel();
                let proposal = RedirectProposal {
                    response: meta.clone(),
                    request: next.clone(),
                };
                events.on_redirect(proposal, reply);
                match decision_or_default(rx, RedirectAction::Follow(next)).await {
                    RedirectAction::Follow(target) => {
                        if host_of(&target.url) != host_of(&current.url) {
                            attempts.credential = None;
                        }
                        tracing::debug!(transfer = %id, from = %current.url, to = %target.url, "following redirect");
                        current = target;
                        continue;
                    }
                    RedirectAction::Refuse => {
                        tracing::debug!(transfer = %id, status = meta.status, "redirect refused");
                        break (response, meta);
                    }
                }
            }
        }

        if meta.status == 401 && attempts.auth_failures < config.max_auth_attempts {
            if let Some(header) = meta.headers.get("www-authenticate") {
                let challenge = parse_challenge(&current.url, header, attempts.auth_failures)?;
                let (reply, rx) = Reply::channel();
                events.on_challenge(challenge, reply);
                match decision_or_default(rx, ChallengeAction::PerformDefaultHandling).await {
                    ChallengeAction::UseCredential(credential) => {
                        tracing::debug!(transfer = %id, user = %credential.user, "retrying with credential");
                        attempts.credential = Some(credential);
                        attempts.auth_failures += 1;
                        continue;
                    }
                    ChallengeAction::CancelChallenge => return Err(TransferError::Cancelled),
                    ChallengeAction::PerformDefaultHandling
                    | ChallengeAction::RejectProtectionSpace => {}
                }
            }
        }

        break (response, meta);
    };

    events.on_response(meta);
    if current.method == Method::Head {
        return Ok(());
    }

    while let Some(chunk) = response.chunk().await.map_err(map_reqwest)? {
        events.on_data(chunk);
    }
    Ok(())
}

/// Issue one request, re-attempting connection failures while waiting for
/// connectivity is enabled.
async fn send(
    inner: &HttpInner,
    id: TransferId,
    request: &Request,
    attempts: &mut Attempts,
    events: &mut dyn TransferEvents,
) -> TransferResult<reqwest::Response> {
    let config = &inner.config;
    let deadline = Instant::now() + config.connectivity_timeout();

    loop {
        let builder = build(&inner.client, request, attempts.credential.as_ref())?;
        match builder.send().await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_connect() && config.wait_for_connectivity => {
                if !attempts.announced_offline {
                    attempts.announced_offline = true;
                    events.on_waiting_for_connectivity();
                }
                if Instant::now() >= deadline {
                    tracing::warn!(transfer = %id, url = %request.url, "gave up waiting for connectivity");
                    return Err(TransferError::TimedOut);
                }
                tracing::debug!(transfer = %id, error = %e, "no connectivity, retrying");
                tokio::time::sleep(config.connectivity_poll()).await;
            }
            Err(e) => return Err(map_reqwest(e)),
        }
    }
}

fn build(
    client: &Client,
    request: &Request,
    credential: Option<&Credential>,
) -> TransferResult<reqwest::RequestBuilder> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
    let url = parse_url(&request.url)?;

    let mut builder = client.request(method, url);
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    if let Some(credential) = credential {
        builder = builder.basic_auth(&credential.user, Some(&credential.password));
    }
    Ok(builder)
}

fn response_meta(response: &reqwest::Response) -> ResponseMeta {
    let mut meta = ResponseMeta::new(response.url().as_str(), response.status().as_u16());
    for (name, value) in response.headers() {
        match value.to_str() {
            Ok(value) => meta.headers.append(name.as_str(), value),
            Err(_) => tracing::trace!(header = %name, "non-ASCII header value skipped"),
        }
    }
    meta.expected_length = meta
        .headers
        .get("content-length")
        .and_then(|v| v.trim().parse().ok());
    meta
}

/// The request to issue for a redirect from `current` to `location`.
pub fn redirect_request(current: &Request, status: u16, location: &str) -> TransferResult<Request> {
    let base = parse_url(&current.url)?;
    let target = base.join(location).map_err(|e| {
        TransferError::InvalidRequest(format!("bad redirect location {location:?}: {e}"))
    })?;

    let keeps_method = matches!(current.method, Method::Get | Method::Head);
    let to_get = match status {
        303 => current.method != Method::Head,
        301 | 302 => !keeps_method,
        _ => false,
    };

    let mut next = current.clone();
    next.url = target.to_string();
    if to_get {
        next.method = Method::Get;
        next.body = None;
        next.headers.remove("content-type");
        next.headers.remove("content-length");
    }
    if target.host_str() != base.host_str() {
        next.headers.remove("authorization");
        next.headers.remove("cookie");
    }
    Ok(next)
}

/// Challenge details from a 401's `WWW-Authenticate` header.
pub fn parse_challenge(url: &str, header: &str, previous_failures: u32) -> TransferResult<AuthChallenge> {
    let parsed = parse_url(url)?;
    let header = header.trim();
    let (scheme, params) = header
        .split_once(char::is_whitespace)
        .unwrap_or((header, ""));

    let realm = params.split(',').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("realm")
            .then(|| value.trim().trim_matches('"').to_string())
    });

    Ok(AuthChallenge {
        host: parsed.host_str().unwrap_or_default().to_string(),
        port: parsed.port_or_known_default().unwrap_or(0),
        scheme: scheme.to_string(),
        realm,
        previous_failures,
    })
}

fn parse_url(url: &str) -> TransferResult<Url> {
    Url::parse(url).map_err(|e| TransferError::InvalidRequest(format!("bad URL {url:?}: {e}")))
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

fn map_reqwest(error: reqwest::Error) -> TransferError {
    if error.is_timeout() {
        return TransferError::TimedOut;
    }
    if error.is_builder() {
        return TransferError::InvalidRequest(error.to_string());
    }
    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransferError::Transport(message)
}
