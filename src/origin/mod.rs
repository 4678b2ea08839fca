//! Origin fetcher module
//!
//! Abstracts the upstream file store. The engine only sees the [`Origin`]
//! trait; [`HttpOrigin`] talks to a real store over HTTP, and tests plug in an
//! in-memory fake.

pub mod client;
mod error;
#[cfg(test)]
pub mod fake;

pub use client::HttpOrigin;
pub use error::OriginError;

use async_trait::async_trait;
use futures_util::StreamExt;
use hyper::body::Bytes;
use hyper::Method;

use crate::http::response::{BodyStream, HeaderList};

/// GET or HEAD of a resource, optionally restricted to a byte range
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub path: &'a str,
    /// Full Range header value to send, e.g. `bytes=0-99`
    pub range: Option<&'a str>,
    pub head: bool,
}

impl<'a> FetchRequest<'a> {
    /// Metadata probe: HEAD without Range
    pub const fn probe(path: &'a str) -> Self {
        Self {
            path,
            range: None,
            head: true,
        }
    }

    /// Whole-body GET
    pub const fn whole(path: &'a str) -> Self {
        Self {
            path,
            range: None,
            head: false,
        }
    }
}

/// Request relayed verbatim for paths outside range handling
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path plus query string, as received
    pub path_and_query: String,
    pub headers: HeaderList,
    pub body: Bytes,
}

/// Raw origin response; status interpretation is left to the caller
pub struct OriginResponse {
    pub status: u16,
    pub headers: HeaderList,
    body: BodyStream,
}

impl std::fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl OriginResponse {
    pub fn new(status: u16, headers: HeaderList, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// First header value with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn content_range(&self) -> Option<&str> {
        self.header("content-range")
    }

    /// Map the origin's not-found and failure statuses onto [`OriginError`]
    pub fn require_success(self) -> Result<Self, OriginError> {
        match self.status {
            404 => Err(OriginError::NotFound),
            200..=299 => Ok(self),
            status => Err(OriginError::Status(status)),
        }
    }

    pub fn into_body(self) -> BodyStream {
        self.body
    }

    /// Buffer the whole body
    ///
    /// Fails when the declared or received size exceeds `limit`, or when the
    /// received size disagrees with the declared `Content-Length`.
    pub async fn collect(self, limit: Option<u64>) -> Result<Bytes, OriginError> {
        let declared = self.content_length();
        if let (Some(size), Some(limit)) = (declared, limit) {
            if size > limit {
                return Err(OriginError::TooLarge { size, limit });
            }
        }

        let capacity = declared
            .and_then(|d| usize::try_from(d).ok())
            .unwrap_or_default();
        let mut buf = Vec::with_capacity(capacity);
        let mut body = self.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| OriginError::Body(e.to_string()))?;
            buf.extend_from_slice(&chunk);
            if let Some(limit) = limit {
                let size = buf.len() as u64;
                if size > limit {
                    return Err(OriginError::TooLarge { size, limit });
                }
            }
        }

        let actual = buf.len() as u64;
        match declared {
            Some(expected) if expected != actual => {
                Err(OriginError::SizeMismatch { expected, actual })
            }
            _ => Ok(Bytes::from(buf)),
        }
    }
}

/// Upstream file store
#[async_trait]
pub trait Origin: Send + Sync {
    /// GET or HEAD a resource by path
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<OriginResponse, OriginError>;

    /// Relay an arbitrary request unchanged
    async fn forward(&self, request: ForwardRequest) -> Result<OriginResponse, OriginError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::once_stream;

    fn response(status: u16, length: Option<&str>, body: &'static [u8]) -> OriginResponse {
        let headers = length
            .map(|l| vec![("Content-Length".to_string(), l.to_string())])
            .unwrap_or_default();
        OriginResponse::new(status, headers, once_stream(Bytes::from_static(body)))
    }

    #[test]
    fn test_require_success() {
        assert!(matches!(
            response(404, None, b"").require_success(),
            Err(OriginError::NotFound)
        ));
        assert!(matches!(
            response(503, None, b"").require_success(),
            Err(OriginError::Status(503))
        ));
        assert!(response(200, None, b"").require_success().is_ok());
    }

    #[tokio::test]
    async fn test_collect_checks_declared_length() {
        let bytes = response(200, Some("5"), b"hello").collect(None).await.unwrap();
        assert_eq!(&bytes[..], b"hello");

        let err = response(200, Some("9"), b"hello").collect(None).await.unwrap_err();
        assert!(matches!(err, OriginError::SizeMismatch { expected: 9, actual: 5 }));
    }

    #[tokio::test]
    async fn test_collect_enforces_limit() {
        let err = response(200, Some("5"), b"hello").collect(Some(4)).await.unwrap_err();
        assert!(matches!(err, OriginError::TooLarge { size: 5, limit: 4 }));

        // No declared length: the limit is checked while reading
        let err = response(200, None, b"hello").collect(Some(4)).await.unwrap_err();
        assert!(matches!(err, OriginError::TooLarge { limit: 4, .. }));
    }
}
