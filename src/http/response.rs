//! HTTP response building module
//!
//! Builds every outbound response the proxy can emit. The types here are
//! independent of the HTTP server in use; `handler` converts them into hyper
//! responses at the edge.

use std::fmt;
use std::pin::Pin;

use futures_util::{stream, Stream};
use hyper::body::Bytes;

use super::cache::CachePolicy;
use super::range::{ByteInterval, RangeParseResult};

/// Error type carried by streamed bodies
pub type BodyError = Box<dyn std::error::Error + Send + Sync>;

/// Streamed response body
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BodyError>> + Send>>;

/// Header list in emission order
pub type HeaderList = Vec<(String, String)>;

/// Headers present on every response, whatever the branch
const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, HEAD, OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "Range, Content-Range, Authorization, Content-Type",
    ),
    (
        "Access-Control-Expose-Headers",
        "Content-Length, Content-Range, Accept-Ranges",
    ),
];

const PREFLIGHT_MAX_AGE: &str = "86400";

/// Response headers relayed from an origin are never allowed to override these
const OWNED_HEADERS: [&str; 7] = [
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
    "access-control-expose-headers",
    "access-control-max-age",
    "cache-control",
    "x-content-type-options",
];

/// Hop-by-hop headers (RFC 7230 §6.1) never relayed in either direction
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Outbound body
pub enum ResponseBody {
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

#[cfg(test)]
impl ResponseBody {
    /// Drain the body into memory
    pub async fn collect(self) -> Result<Bytes, BodyError> {
        use futures_util::StreamExt;

        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(mut body) => {
                let mut buf = Vec::new();
                while let Some(chunk) = body.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Response produced once per request, read-only afterwards
#[derive(Debug)]
pub struct OutboundResponse {
    status: u16,
    headers: HeaderList,
    body: ResponseBody,
}

impl OutboundResponse {
    pub const fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, if any
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    pub const fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_parts(self) -> (u16, HeaderList, ResponseBody) {
        (self.status, self.headers, self.body)
    }
}

/// Facts about a resource computed once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDescriptor {
    pub content_type: &'static str,
    pub total_size: u64,
}

/// Resource bytes handed to the synthesizer
pub enum Content {
    /// Entire resource in memory; a range is sliced out locally
    Buffered(Bytes),
    /// Body already matching the response: the whole resource for a 200,
    /// exactly the requested window for a 206
    Exact(BodyStream),
    /// HEAD request: headers only
    Headless,
}

/// Response synthesizer
///
/// Holds the per-deployment header policy; every builder attaches the same
/// CORS set and freshness hint so no branch can drop them.
#[derive(Debug, Clone)]
pub struct ResponseSynthesizer {
    cache_control: String,
}

impl Default for ResponseSynthesizer {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl ResponseSynthesizer {
    pub fn new(cache_policy: CachePolicy) -> Self {
        Self {
            cache_control: cache_policy.to_header_value(),
        }
    }

    /// Build the response for a resolved range outcome
    ///
    /// - `NotRequested` → 200 with the full body
    /// - `Valid` → 206 with exactly the requested slice
    /// - `NotSatisfiable` → 416, no resource bytes
    ///
    /// Buffered content whose length disagrees with the descriptor yields a 500
    /// rather than a malformed 2xx.
    pub fn synthesize(
        &self,
        range: &RangeParseResult,
        content: Content,
        descriptor: &ContentDescriptor,
    ) -> OutboundResponse {
        match range {
            RangeParseResult::NotRequested => self.full(content, descriptor),
            RangeParseResult::Valid(interval) => self.partial(*interval, content, descriptor),
            RangeParseResult::NotSatisfiable(_) => self.not_satisfiable(descriptor.total_size),
        }
    }

    fn full(&self, content: Content, descriptor: &ContentDescriptor) -> OutboundResponse {
        let body = match content {
            Content::Buffered(bytes) => {
                if bytes.len() as u64 != descriptor.total_size {
                    return self.internal_error();
                }
                ResponseBody::Full(bytes)
            }
            Content::Exact(stream) => ResponseBody::Stream(stream),
            Content::Headless => ResponseBody::Empty,
        };

        let mut headers = self.base_headers();
        push(&mut headers, "Content-Type", descriptor.content_type);
        push(&mut headers, "Content-Length", descriptor.total_size);
        push(&mut headers, "Accept-Ranges", "bytes");
        self.finish(200, headers, body)
    }

    fn partial(
        &self,
        interval: ByteInterval,
        content: Content,
        descriptor: &ContentDescriptor,
    ) -> OutboundResponse {
        if interval.end() >= descriptor.total_size {
            return self.internal_error();
        }

        let body = match content {
            Content::Buffered(bytes) => match slice_window(bytes, interval, descriptor.total_size) {
                Some(window) => ResponseBody::Full(window),
                None => return self.internal_error(),
            },
            Content::Exact(stream) => ResponseBody::Stream(stream),
            Content::Headless => ResponseBody::Empty,
        };

        let mut headers = self.base_headers();
        push(&mut headers, "Content-Type", descriptor.content_type);
        push(&mut headers, "Content-Length", interval.len());
        push(
            &mut headers,
            "Content-Range",
            interval.content_range(descriptor.total_size),
        );
        push(&mut headers, "Accept-Ranges", "bytes");
        self.finish(206, headers, body)
    }

    /// 416 Range Not Satisfiable
    pub fn not_satisfiable(&self, total_size: u64) -> OutboundResponse {
        let mut headers = self.base_headers();
        push(&mut headers, "Content-Range", format!("bytes */{total_size}"));
        self.message(416, headers, "Range Not Satisfiable")
    }

    /// 404 Not Found
    pub fn not_found(&self) -> OutboundResponse {
        self.message(404, self.base_headers(), "404 Not Found")
    }

    /// 405 Method Not Allowed
    pub fn method_not_allowed(&self) -> OutboundResponse {
        let mut headers = self.base_headers();
        push(&mut headers, "Allow", "GET, HEAD, OPTIONS");
        self.message(405, headers, "405 Method Not Allowed")
    }

    /// 413 Payload Too Large
    pub fn payload_too_large(&self) -> OutboundResponse {
        self.message(413, self.base_headers(), "413 Payload Too Large")
    }

    /// 500 with a generic body; the cause is never exposed to the client
    pub fn internal_error(&self) -> OutboundResponse {
        self.message(500, self.base_headers(), "Internal Server Error")
    }

    /// CORS preflight (204, no body)
    pub fn preflight(&self) -> OutboundResponse {
        let mut headers = self.base_headers();
        push(&mut headers, "Access-Control-Max-Age", PREFLIGHT_MAX_AGE);
        self.finish(204, headers, ResponseBody::Empty)
    }

    /// Generic small response (health probes, banner)
    pub fn text(
        &self,
        status: u16,
        content_type: &str,
        body: impl Into<Bytes>,
        is_head: bool,
    ) -> OutboundResponse {
        let body: Bytes = body.into();
        let mut headers = self.base_headers();
        push(&mut headers, "Content-Type", content_type);
        push(&mut headers, "Content-Length", body.len());
        let body = if is_head {
            ResponseBody::Empty
        } else {
            ResponseBody::Full(body)
        };
        self.finish(status, headers, body)
    }

    /// Relay an origin response unchanged apart from the proxy-owned headers
    pub fn relay(&self, status: u16, origin_headers: HeaderList, body: BodyStream) -> OutboundResponse {
        let mut headers: HeaderList = origin_headers
            .into_iter()
            .filter(|(name, _)| !is_owned(name) && !is_hop_by_hop(name))
            .collect();
        headers.extend(self.base_headers());
        self.finish(status, headers, ResponseBody::Stream(body))
    }

    fn message(&self, status: u16, mut headers: HeaderList, text: &'static str) -> OutboundResponse {
        push(&mut headers, "Content-Type", "text/plain; charset=utf-8");
        push(&mut headers, "Content-Length", text.len());
        self.finish(status, headers, ResponseBody::Full(Bytes::from_static(text.as_bytes())))
    }

    fn base_headers(&self) -> HeaderList {
        let mut headers: HeaderList = CORS_HEADERS
            .iter()
            .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
            .collect();
        push(&mut headers, "Cache-Control", &self.cache_control);
        push(&mut headers, "X-Content-Type-Options", "nosniff");
        headers
    }

    #[allow(clippy::unused_self)]
    fn finish(&self, status: u16, headers: HeaderList, body: ResponseBody) -> OutboundResponse {
        OutboundResponse {
            status,
            headers,
            body,
        }
    }
}

/// Copy the window out so the full buffer can be released right away
fn slice_window(bytes: Bytes, interval: ByteInterval, total_size: u64) -> Option<Bytes> {
    if bytes.len() as u64 != total_size {
        return None;
    }
    if interval.len() == total_size {
        return Some(bytes);
    }
    let start = usize::try_from(interval.start()).ok()?;
    let end = usize::try_from(interval.end()).ok()?;
    let window = Bytes::copy_from_slice(bytes.get(start..=end)?);
    drop(bytes);
    Some(window)
}

fn is_owned(name: &str) -> bool {
    OWNED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

fn push(headers: &mut HeaderList, name: &str, value: impl ToString) {
    headers.push((name.to_string(), value.to_string()));
}

/// Single-chunk stream, for bodies that are already in memory
pub fn once_stream(bytes: Bytes) -> BodyStream {
    Box::pin(stream::once(async move { Ok::<_, BodyError>(bytes) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::range::parse_range_header;

    const DESCRIPTOR: ContentDescriptor = ContentDescriptor {
        content_type: "application/octet-stream",
        total_size: 1000,
    };

    fn resource() -> Bytes {
        Bytes::from((0..1000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>())
    }

    fn assert_cors(resp: &OutboundResponse) {
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
        assert_eq!(
            resp.header("Access-Control-Allow-Methods"),
            Some("GET, HEAD, OPTIONS")
        );
        assert!(resp
            .header("Access-Control-Allow-Headers")
            .is_some_and(|v| v.contains("Range") && v.contains("Authorization")));
        assert!(resp
            .header("Access-Control-Expose-Headers")
            .is_some_and(|v| v.contains("Content-Range") && v.contains("Accept-Ranges")));
        assert_eq!(resp.header("Cache-Control"), Some("public, max-age=86400"));
    }

    #[tokio::test]
    async fn test_full_response() {
        let synth = ResponseSynthesizer::default();
        let resp = synth.synthesize(
            &RangeParseResult::NotRequested,
            Content::Buffered(resource()),
            &DESCRIPTOR,
        );
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.content_length(), Some(1000));
        assert_eq!(resp.header("Accept-Ranges"), Some("bytes"));
        assert!(resp.header("Content-Range").is_none());
        assert_cors(&resp);
        let (_, _, body) = resp.into_parts();
        assert_eq!(body.collect().await.unwrap(), resource());
    }

    #[tokio::test]
    async fn test_partial_response_is_byte_exact() {
        let synth = ResponseSynthesizer::default();
        let range = parse_range_header(Some("bytes=100-199"), 1000);
        let resp = synth.synthesize(&range, Content::Buffered(resource()), &DESCRIPTOR);
        assert_eq!(resp.status(), 206);
        assert_eq!(resp.header("Content-Range"), Some("bytes 100-199/1000"));
        assert_eq!(resp.content_length(), Some(100));
        assert_cors(&resp);
        let (_, _, body) = resp.into_parts();
        let body = body.collect().await.unwrap();
        assert_eq!(body.len(), 100);
        assert_eq!(&body[..], &resource()[100..200]);
    }

    #[test]
    fn test_not_satisfiable_response() {
        let synth = ResponseSynthesizer::default();
        let range = parse_range_header(Some("bytes=2000-3000"), 1000);
        let resp = synth.synthesize(&range, Content::Buffered(resource()), &DESCRIPTOR);
        assert_eq!(resp.status(), 416);
        assert_eq!(resp.header("Content-Range"), Some("bytes */1000"));
        assert_cors(&resp);
    }

    #[test]
    fn test_inconsistent_buffer_is_internal_error() {
        let synth = ResponseSynthesizer::default();
        let range = parse_range_header(Some("bytes=0-9"), 1000);
        let resp = synth.synthesize(
            &range,
            Content::Buffered(Bytes::from_static(b"short")),
            &DESCRIPTOR,
        );
        assert_eq!(resp.status(), 500);
        assert_cors(&resp);

        let resp = synth.synthesize(
            &RangeParseResult::NotRequested,
            Content::Buffered(Bytes::from_static(b"short")),
            &DESCRIPTOR,
        );
        assert_eq!(resp.status(), 500);
    }

    #[test]
    fn test_headless_keeps_headers() {
        let synth = ResponseSynthesizer::default();
        let range = parse_range_header(Some("bytes=-100"), 1000);
        let resp = synth.synthesize(&range, Content::Headless, &DESCRIPTOR);
        assert_eq!(resp.status(), 206);
        assert_eq!(resp.header("Content-Range"), Some("bytes 900-999/1000"));
        assert_eq!(resp.content_length(), Some(100));
        assert!(matches!(resp.body(), ResponseBody::Empty));
    }

    #[test]
    fn test_error_responses_carry_cors() {
        let synth = ResponseSynthesizer::new(CachePolicy::NoStore);
        for resp in [
            synth.not_found(),
            synth.internal_error(),
            synth.method_not_allowed(),
            synth.payload_too_large(),
            synth.preflight(),
        ] {
            assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
            assert_eq!(resp.header("Cache-Control"), Some("no-store"));
        }
        assert_eq!(synth.preflight().status(), 204);
        assert_eq!(synth.preflight().header("Access-Control-Max-Age"), Some("86400"));
        assert_eq!(synth.preflight().header("Content-Length"), None);
        assert_eq!(synth.method_not_allowed().header("Allow"), Some("GET, HEAD, OPTIONS"));
    }

    #[test]
    fn test_relay_replaces_owned_headers() {
        let synth = ResponseSynthesizer::default();
        let origin_headers = vec![
            ("content-type".to_string(), "text/css".to_string()),
            ("cache-control".to_string(), "max-age=0".to_string()),
            ("access-control-allow-origin".to_string(), "https://x".to_string()),
            ("transfer-encoding".to_string(), "chunked".to_string()),
        ];
        let resp = synth.relay(201, origin_headers, once_stream(Bytes::new()));
        assert_eq!(resp.status(), 201);
        assert_eq!(resp.header("content-type"), Some("text/css"));
        assert_eq!(resp.header("cache-control"), Some("public, max-age=86400"));
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
        assert!(resp.header("transfer-encoding").is_none());
    }
}
