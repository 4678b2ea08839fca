//! In-memory origin used by engine and handler tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hyper::body::Bytes;

use super::{FetchRequest, ForwardRequest, Origin, OriginError, OriginResponse};
use crate::http::range::{parse_range_header, RangeParseResult};
use crate::http::response::{once_stream, HeaderList};

/// One call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub range: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeOrigin {
    files: HashMap<String, Bytes>,
    honor_ranges: bool,
    unreachable: bool,
    /// Added to the size reported by HEAD, to simulate a file changing between calls
    head_size_drift: u64,
    omit_length: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeOrigin {
    pub fn new() -> Self {
        Self {
            honor_ranges: true,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: &str, bytes: impl Into<Bytes>) -> Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }

    /// Answer Range requests with the whole body and a 200
    pub fn ignoring_ranges(mut self) -> Self {
        self.honor_ranges = false;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_head_drift(mut self, drift: u64) -> Self {
        self.head_size_drift = drift;
        self
    }

    pub fn without_length(mut self) -> Self {
        self.omit_length = true;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn record(&self, method: &str, path: &str, range: Option<&str>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method: method.to_string(),
                path: path.to_string(),
                range: range.map(str::to_string),
            });
        }
    }

    fn length_header(&self, headers: &mut HeaderList, size: u64) {
        if !self.omit_length {
            headers.push(("Content-Length".to_string(), size.to_string()));
        }
    }

    fn respond(&self, path: &str, range: Option<&str>, head: bool) -> Result<OriginResponse, OriginError> {
        if self.unreachable {
            return Err(OriginError::Unreachable("connection refused".to_string()));
        }
        let Some(file) = self.files.get(path).cloned() else {
            return Ok(OriginResponse::new(404, Vec::new(), once_stream(Bytes::new())));
        };
        let total = file.len() as u64;
        let mut headers = vec![("Content-Type".to_string(), "application/octet-stream".to_string())];

        let parsed = if self.honor_ranges {
            parse_range_header(range, total)
        } else {
            RangeParseResult::NotRequested
        };

        let (status, body) = match parsed {
            RangeParseResult::Valid(interval) => {
                headers.push(("Content-Range".to_string(), interval.content_range(total)));
                self.length_header(&mut headers, interval.len());
                let start = interval.start() as usize;
                let end = interval.end() as usize;
                (206, file.slice(start..=end))
            }
            RangeParseResult::NotSatisfiable(_) => {
                headers.push(("Content-Range".to_string(), format!("bytes */{total}")));
                (416, Bytes::new())
            }
            RangeParseResult::NotRequested => {
                let reported = if head { total + self.head_size_drift } else { total };
                self.length_header(&mut headers, reported);
                (200, file)
            }
        };

        let body = if head { Bytes::new() } else { body };
        Ok(OriginResponse::new(status, headers, once_stream(body)))
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<OriginResponse, OriginError> {
        let method = if request.head { "HEAD" } else { "GET" };
        self.record(method, request.path, request.range);
        self.respond(request.path, request.range, request.head)
    }

    async fn forward(&self, request: ForwardRequest) -> Result<OriginResponse, OriginError> {
        let path = request
            .path_and_query
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        self.record(request.method.as_str(), &path, None);
        if self.unreachable {
            return Err(OriginError::Unreachable("connection refused".to_string()));
        }
        let status = if self.files.contains_key(&path) { 200 } else { 404 };
        // Echo the request body so tests can check it was relayed
        let headers = vec![
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Content-Length".to_string(), request.body.len().to_string()),
            ("Connection".to_string(), "close".to_string()),
        ];
        Ok(OriginResponse::new(status, headers, once_stream(request.body)))
    }
}
