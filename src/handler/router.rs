//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: turns a hyper request into an
//! [`InboundRequest`], answers the proxy's own endpoints, hands everything
//! else to the engine and converts the result back into a hyper response.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, StatusCode, Version};

use super::AppState;
use crate::engine::InboundRequest;
use crate::http::response::{BodyError, HeaderList, OutboundResponse, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Body type of every response the server writes
pub type ProxyBody = UnsyncBoxBody<Bytes, BodyError>;

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ProxyBody>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.range = header_str(&parts.headers, "range").map(ToString::to_string);
    entry.referer = header_str(&parts.headers, "referer").map(ToString::to_string);
    entry.user_agent = header_str(&parts.headers, "user-agent").map(ToString::to_string);

    let max_body_size = state.config.http.max_body_size;
    let response = if let Some(resp) = local_response(&state, &parts.method, parts.uri.path()) {
        resp
    } else if exceeds_body_limit(&parts.headers, max_body_size) {
        state.engine.synthesizer().payload_too_large()
    } else {
        match read_body(&state, &parts.method, body).await {
            Ok(body) => {
                let inbound = InboundRequest {
                    method: parts.method.clone(),
                    path: parts.uri.path().to_string(),
                    query: parts.uri.query().map(ToString::to_string),
                    headers: header_list(&parts.headers),
                    body,
                };
                state.engine.handle(inbound).await
            }
            Err(resp) => resp,
        }
    };

    entry.status = response.status();
    entry.body_bytes = if parts.method == Method::HEAD {
        Some(0)
    } else {
        response.content_length()
    };
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    if state.config.logging.access_log {
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(into_hyper_response(response))
}

/// Endpoints answered without touching the origin: health probes and the
/// optional banner at `/`. Preflight is left to the engine.
fn local_response(state: &AppState, method: &Method, path: &str) -> Option<OutboundResponse> {
    if *method != Method::GET && *method != Method::HEAD {
        return None;
    }
    let is_head = *method == Method::HEAD;
    let synthesizer = state.engine.synthesizer();

    let health = &state.config.health;
    if health.enabled && (path == health.liveness_path || path == health.readiness_path) {
        let body = serde_json::json!({ "status": "ok" }).to_string();
        return Some(synthesizer.text(200, "application/json", body, is_head));
    }

    if path == "/" {
        if let Some(banner) = &state.config.http.banner {
            return Some(synthesizer.text(
                200,
                "text/plain; charset=utf-8",
                banner.clone(),
                is_head,
            ));
        }
    }
    None
}

/// Declared `Content-Length` above the configured limit
fn exceeds_body_limit(headers: &HeaderMap, max_body_size: u64) -> bool {
    let Some(value) = header_str(headers, "content-length") else {
        return false;
    };
    match value.trim().parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            true
        }
        Ok(_) => false,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{value}', skipping size check"
            ));
            false
        }
    }
}

/// Buffer the request body for forwarding; GET, HEAD and OPTIONS bodies are ignored
async fn read_body(
    state: &AppState,
    method: &Method,
    body: Incoming,
) -> Result<Bytes, OutboundResponse> {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(Bytes::new());
    }

    let synthesizer = state.engine.synthesizer();
    let max_body_size = state.config.http.max_body_size;
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Streamed request body exceeded {max_body_size} bytes"));
            Err(synthesizer.payload_too_large())
        }
        Err(e) => {
            logger::log_debug(&format!("Failed to read request body: {e}"));
            Err(synthesizer.text(400, "text/plain; charset=utf-8", "400 Bad Request", false))
        }
    }
}

/// Convert the engine's response into a hyper response
///
/// Streamed bodies are passed through frame by frame; dropping the response
/// (client gone) drops the origin stream with it.
pub fn into_hyper_response(response: OutboundResponse) -> Response<ProxyBody> {
    let (status, headers, body) = response.into_parts();

    let body: ProxyBody = match body {
        ResponseBody::Empty => Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed_unsync(),
        ResponseBody::Full(bytes) => Full::new(bytes)
            .map_err(|never| match never {})
            .boxed_unsync(),
        ResponseBody::Stream(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(body).unwrap_or_else(|e| {
        logger::log_error(&format!("Failed to build response: {e}"));
        let mut fallback = Response::new(
            Empty::<Bytes>::new()
                .map_err(|never| match never {})
                .boxed_unsync(),
        );
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

fn header_list(headers: &HeaderMap) -> HeaderList {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{EngineSettings, NullSink, RangeEngine};
    use crate::origin::fake::FakeOrigin;

    fn state(extra: &str) -> AppState {
        let toml = format!("[origin]\nbase_url = \"http://127.0.0.1:9\"\n{extra}");
        let config = Config::load_from_str(&toml).unwrap();
        let engine = RangeEngine::new(
            Arc::new(FakeOrigin::new()),
            EngineSettings::from_config(&config),
            Arc::new(NullSink),
        );
        AppState { config, engine }
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let state = state("");
        let resp = local_response(&state, &Method::GET, "/healthz").unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
        let (_, _, body) = resp.into_parts();
        assert_eq!(&body.collect().await.unwrap()[..], br#"{"status":"ok"}"#);

        assert!(local_response(&state, &Method::GET, "/readyz").is_some());
        assert!(local_response(&state, &Method::OPTIONS, "/healthz").is_none());
        assert!(local_response(&state, &Method::GET, "/app.hap").is_none());
    }

    #[test]
    fn test_health_can_be_disabled() {
        let state = state("[health]\nenabled = false");
        assert!(local_response(&state, &Method::GET, "/healthz").is_none());
    }

    #[test]
    fn test_banner_only_when_configured() {
        assert!(local_response(&state(""), &Method::GET, "/").is_none());

        let state = state("[http]\nbanner = \"HAP proxy is running\"");
        let resp = local_response(&state, &Method::HEAD, "/").unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.content_length(), Some(20));
        assert!(matches!(resp.body(), ResponseBody::Empty));
    }

    #[test]
    fn test_body_limit() {
        let mut headers = HeaderMap::new();
        assert!(!exceeds_body_limit(&headers, 10));
        headers.insert("content-length", "11".parse().unwrap());
        assert!(exceeds_body_limit(&headers, 10));
        headers.insert("content-length", "10".parse().unwrap());
        assert!(!exceeds_body_limit(&headers, 10));
        headers.insert("content-length", "ten".parse().unwrap());
        assert!(!exceeds_body_limit(&headers, 10));
    }

    #[tokio::test]
    async fn test_into_hyper_response_keeps_headers_and_body() {
        let synth = crate::http::ResponseSynthesizer::default();
        let resp = into_hyper_response(synth.not_satisfiable(1000));
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()["content-range"], "bytes */1000");
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Range Not Satisfiable");
    }

    #[tokio::test]
    async fn test_streamed_body_converted() {
        let synth = crate::http::ResponseSynthesizer::default();
        let stream = crate::http::response::once_stream(Bytes::from_static(b"relayed"));
        let resp = into_hyper_response(synth.relay(200, Vec::new(), stream));
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"relayed");
    }
}
