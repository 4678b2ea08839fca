//! Range-request resolution engine
//!
//! Environment-agnostic core: takes an [`InboundRequest`], talks to the
//! [`Origin`] under the configured [`FetchStrategy`] and returns an
//! [`OutboundResponse`]. Host adapters (the hyper handler, tests) only
//! translate request and response shapes at the boundary.

mod events;
mod strategy;

#[cfg(test)]
pub use events::testing;
pub use events::{EngineEvent, EventSink, NullSink};

use std::sync::Arc;

use hyper::body::Bytes;
use hyper::Method;

use crate::config::{Config, FetchStrategy};
use crate::http::cache::CachePolicy;
use crate::http::mime::content_type_for_path;
use crate::http::response::{HeaderList, OutboundResponse, ResponseSynthesizer};
use crate::origin::{FetchRequest, ForwardRequest, Origin, OriginError, OriginResponse};

/// Engine knobs taken from configuration at startup
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub strategy: FetchStrategy,
    /// Suffixes that get range handling; empty means every path
    pub range_suffixes: Vec<String>,
    pub max_buffer_bytes: Option<u64>,
    pub cache_policy: CachePolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.origin.strategy,
            range_suffixes: config.origin.range_suffixes.clone(),
            max_buffer_bytes: config.origin.max_buffer_bytes,
            cache_policy: config.http.cache_policy(),
        }
    }

    /// Whether range handling applies to this path (suffix match ignores case)
    pub fn is_range_aware(&self, path: &str) -> bool {
        if self.range_suffixes.is_empty() {
            return true;
        }
        let path = path.to_ascii_lowercase();
        self.range_suffixes
            .iter()
            .any(|suffix| path.ends_with(&suffix.to_ascii_lowercase()))
    }
}

/// Request as seen by the engine
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// URL path without the query, mapped 1:1 onto the origin
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Raw `Range` header value, if the client sent one
    pub fn range(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("range"))
            .map(|(_, v)| v.as_str())
    }

    fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }
}

pub struct RangeEngine {
    origin: Arc<dyn Origin>,
    settings: EngineSettings,
    synthesizer: ResponseSynthesizer,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RangeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RangeEngine {
    pub fn new(origin: Arc<dyn Origin>, settings: EngineSettings, events: Arc<dyn EventSink>) -> Self {
        let synthesizer = ResponseSynthesizer::new(settings.cache_policy);
        Self {
            origin,
            settings,
            synthesizer,
            events,
        }
    }

    /// Synthesizer carrying this deployment's header policy, for responses
    /// the adapter builds itself (health, banner, 413)
    pub const fn synthesizer(&self) -> &ResponseSynthesizer {
        &self.synthesizer
    }

    /// Resolve one request into exactly one response
    pub async fn handle(&self, request: InboundRequest) -> OutboundResponse {
        self.events.emit(&EngineEvent::RequestReceived {
            method: request.method.as_str(),
            path: &request.path,
            range: request.range(),
        });

        let path = request.path.clone();
        let response = if request.method == Method::OPTIONS {
            self.synthesizer.preflight()
        } else if !self.settings.is_range_aware(&request.path) {
            self.forward(request).await
        } else if request.method == Method::GET || request.method == Method::HEAD {
            self.resolve(&request).await
        } else {
            self.synthesizer.method_not_allowed()
        };

        self.events.emit(&EngineEvent::ResponseEmitted {
            path: &path,
            status: response.status(),
            content_length: response.content_length(),
        });
        response
    }

    async fn resolve(&self, request: &InboundRequest) -> OutboundResponse {
        let head = request.method == Method::HEAD;
        let path = request.path.as_str();
        let content_type = content_type_for_path(path);
        let range = request.range();

        let result = match self.settings.strategy {
            FetchStrategy::Passthrough => self.passthrough(path, range, head, content_type).await,
            FetchStrategy::ProbeThenSlice => {
                self.probe_then_slice(path, range, head, content_type).await
            }
            FetchStrategy::FetchAndSlice => {
                self.fetch_and_slice(path, range, head, content_type).await
            }
        };

        result.unwrap_or_else(|e| self.fail(path, &e))
    }

    /// Transparent reverse proxy for paths outside range handling
    async fn forward(&self, request: InboundRequest) -> OutboundResponse {
        let path = request.path.clone();
        let forward = ForwardRequest {
            method: request.method.clone(),
            path_and_query: request.path_and_query(),
            headers: request.headers,
            body: request.body,
        };

        let result = self.origin.forward(forward).await;
        match result {
            Ok(mut resp) => {
                self.report_origin(&path, Some(resp.status), None);
                let headers = std::mem::take(&mut resp.headers);
                self.synthesizer.relay(resp.status, headers, resp.into_body())
            }
            Err(e) => {
                self.report_origin(&path, None, Some(&e));
                self.synthesizer.internal_error()
            }
        }
    }

    /// One origin round trip; failures are reported once, by `fail`
    async fn call(&self, request: FetchRequest<'_>) -> Result<OriginResponse, OriginError> {
        let resp = self.origin.fetch(request).await?;
        self.report_origin(request.path, Some(resp.status), None);
        Ok(resp)
    }

    fn report_origin(&self, path: &str, status: Option<u16>, error: Option<&OriginError>) {
        self.events.emit(&EngineEvent::OriginResult {
            path,
            status,
            error,
        });
    }

    /// Map a failure to 404 or a generic 500; the detail only reaches the sink
    fn fail(&self, path: &str, error: &OriginError) -> OutboundResponse {
        self.report_origin(path, error.upstream_status(), Some(error));
        match error.client_status() {
            404 => self.synthesizer.not_found(),
            _ => self.synthesizer.internal_error(),
        }
    }
}
