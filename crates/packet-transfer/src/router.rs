//! Scheme router: dispatches each transfer to the engine registered for
//! its URL scheme.

use std::collections::HashMap;
use std::sync::Arc;

use packet_core::config::PacketConfig;
use packet_core::{Request, TransferError, TransferId};

use crate::engine::{TransferEvents, TransportEngine};
use crate::http::HttpEngine;
use crate::local::LocalEngine;

#[derive(Clone, Default)]
pub struct SchemeRouter {
    routes: HashMap<String, Arc<dyn TransportEngine>>,
}

impl SchemeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `engine` for `scheme` (case-insensitive), replacing any
    /// previous registration.
    pub fn route(mut self, scheme: &str, engine: Arc<dyn TransportEngine>) -> Self {
        self.routes.insert(scheme.to_ascii_lowercase(), engine);
        self
    }

    /// `file` to the local engine, `http`/`https` to the HTTP engine.
    pub fn standard(config: &PacketConfig) -> Self {
        let mut router =
            Self::new().route("file", Arc::new(LocalEngine::from_config(&config.transfer)));
        match HttpEngine::new(&config.http) {
            Ok(http) => {
                let http: Arc<dyn TransportEngine> = Arc::new(http);
                router = router.route("http", http.clone()).route("https", http);
            }
            Err(e) => {
                tracing::warn!(error = %e, "http engine unavailable, http(s) URLs will be rejected");
            }
        }
        router
    }

    pub fn handles(&self, scheme: &str) -> bool {
        self.routes.contains_key(&scheme.to_ascii_lowercase())
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl TransportEngine for SchemeRouter {
    fn start(&self, id: TransferId, request: Request, mut events: Box<dyn TransferEvents>) {
        let Some(scheme) = request.scheme() else {
            tracing::debug!(transfer = %id, url = %request.url, "request URL has no scheme");
            events.on_complete(Some(TransferError::InvalidRequest(format!(
                "URL has no scheme: {}",
                request.url
            ))));
            return;
        };
        match self.routes.get(&scheme) {
            Some(engine) => engine.start(id, request, events),
            None => {
                tracing::debug!(transfer = %id, scheme = %scheme, "no engine for scheme");
                events.on_complete(Some(TransferError::UnsupportedScheme(scheme)));
            }
        }
    }

    fn cancel(&self, id: TransferId) {
        // Ids are unique across engines; only the owner reacts.
        for engine in self.routes.values() {
            engine.cancel(id);
        }
    }
}
