//! Fetch strategies
//!
//! Each strategy takes its `total_size` and its bytes from the same origin
//! exchange (or checks that two exchanges agree), so a reported size always
//! describes the bytes that are served.

use super::{EngineEvent, RangeEngine};
use crate::http::range::{
    normalize_range_header, parse_content_range, parse_range_header,
    parse_unsatisfied_content_range, RangeParseResult,
};
use crate::http::response::{Content, ContentDescriptor, OutboundResponse};
use crate::origin::{FetchRequest, OriginError, OriginResponse};

impl RangeEngine {
    /// Forward the (normalized) Range header and relay the origin's answer
    pub(super) async fn passthrough(
        &self,
        path: &str,
        range: Option<&str>,
        head: bool,
        content_type: &'static str,
    ) -> Result<OutboundResponse, OriginError> {
        let forwarded = range.and_then(normalize_range_header);
        let resp = self
            .call(FetchRequest {
                path,
                range: forwarded.as_deref(),
                head,
            })
            .await?;

        if forwarded.is_none() {
            let resp = resp.require_success()?;
            return self.serve_whole(path, resp, head, content_type).await;
        }

        match resp.status {
            206 => {
                let (interval, total_size) = resp
                    .content_range()
                    .and_then(parse_content_range)
                    .ok_or_else(|| invalid_content_range(&resp))?;
                if resp.content_length().is_some_and(|len| len != interval.len()) {
                    return Err(invalid_content_range(&resp));
                }

                // The origin may clamp a range we would reject; our verdict wins
                let outcome = parse_range_header(range, total_size);
                self.report_range(path, &outcome, total_size);
                match &outcome {
                    RangeParseResult::Valid(ours) if *ours == interval => {}
                    RangeParseResult::NotSatisfiable(_) => {
                        return Ok(self.synthesizer.not_satisfiable(total_size));
                    }
                    _ => return Err(invalid_content_range(&resp)),
                }

                let content = if head {
                    Content::Headless
                } else {
                    Content::Exact(resp.into_body())
                };
                let descriptor = ContentDescriptor {
                    content_type,
                    total_size,
                };
                Ok(self.synthesizer.synthesize(&outcome, content, &descriptor))
            }
            416 => {
                let total_size = resp
                    .content_range()
                    .and_then(parse_unsatisfied_content_range)
                    .ok_or_else(|| invalid_content_range(&resp))?;
                let outcome = parse_range_header(range, total_size);
                self.report_range(path, &outcome, total_size);
                Ok(self.synthesizer.not_satisfiable(total_size))
            }
            status => {
                let resp = resp.require_success()?;
                // A compliant origin ignores a syntactically invalid Range
                // and sends everything; that is still a 416 for our client
                if let Some(total_size) = resp.content_length() {
                    let outcome = parse_range_header(range, total_size);
                    if !outcome.is_valid() {
                        self.report_range(path, &outcome, total_size);
                        return Ok(self.synthesizer.not_satisfiable(total_size));
                    }
                }
                Err(OriginError::RangeIgnored(status))
            }
        }
    }

    /// HEAD for the size, validate, then GET the whole body and slice it
    pub(super) async fn probe_then_slice(
        &self,
        path: &str,
        range: Option<&str>,
        head: bool,
        content_type: &'static str,
    ) -> Result<OutboundResponse, OriginError> {
        let probe = self.call(FetchRequest::probe(path)).await?.require_success()?;
        let total_size = probe.content_length().ok_or(OriginError::MissingLength)?;
        drop(probe);

        let outcome = parse_range_header(range, total_size);
        self.report_range(path, &outcome, total_size);
        let descriptor = ContentDescriptor {
            content_type,
            total_size,
        };

        if head || matches!(outcome, RangeParseResult::NotSatisfiable(_)) {
            return Ok(self
                .synthesizer
                .synthesize(&outcome, Content::Headless, &descriptor));
        }

        let resp = self.call(FetchRequest::whole(path)).await?.require_success()?;
        if let Some(actual) = resp.content_length() {
            if actual != total_size {
                return Err(OriginError::SizeMismatch {
                    expected: total_size,
                    actual,
                });
            }
            if !outcome.is_valid() {
                return Ok(self.synthesizer.synthesize(
                    &outcome,
                    Content::Exact(resp.into_body()),
                    &descriptor,
                ));
            }
        }

        let bytes = resp.collect(self.settings.max_buffer_bytes).await?;
        let actual = bytes.len() as u64;
        if actual != total_size {
            return Err(OriginError::SizeMismatch {
                expected: total_size,
                actual,
            });
        }
        Ok(self
            .synthesizer
            .synthesize(&outcome, Content::Buffered(bytes), &descriptor))
    }

    /// One whole-body GET; the size comes from that same response
    pub(super) async fn fetch_and_slice(
        &self,
        path: &str,
        range: Option<&str>,
        head: bool,
        content_type: &'static str,
    ) -> Result<OutboundResponse, OriginError> {
        if head {
            let probe = self.call(FetchRequest::probe(path)).await?.require_success()?;
            let total_size = probe.content_length().ok_or(OriginError::MissingLength)?;
            let outcome = parse_range_header(range, total_size);
            self.report_range(path, &outcome, total_size);
            let descriptor = ContentDescriptor {
                content_type,
                total_size,
            };
            return Ok(self
                .synthesizer
                .synthesize(&outcome, Content::Headless, &descriptor));
        }

        let resp = self.call(FetchRequest::whole(path)).await?.require_success()?;
        if range.is_none() {
            return self.serve_whole(path, resp, false, content_type).await;
        }

        let (outcome, content, total_size) = match resp.content_length() {
            Some(total_size) => {
                let outcome = parse_range_header(range, total_size);
                // Dropping the response abandons the transfer
                let content = match outcome {
                    RangeParseResult::NotSatisfiable(_) => Content::Headless,
                    _ => Content::Buffered(resp.collect(self.settings.max_buffer_bytes).await?),
                };
                (outcome, content, total_size)
            }
            None => {
                let bytes = resp.collect(self.settings.max_buffer_bytes).await?;
                let total_size = bytes.len() as u64;
                (parse_range_header(range, total_size), Content::Buffered(bytes), total_size)
            }
        };

        self.report_range(path, &outcome, total_size);
        let descriptor = ContentDescriptor {
            content_type,
            total_size,
        };
        Ok(self.synthesizer.synthesize(&outcome, content, &descriptor))
    }

    /// 200 for a successful whole-resource response, streamed when its
    /// length is declared and buffered otherwise
    async fn serve_whole(
        &self,
        path: &str,
        resp: OriginResponse,
        head: bool,
        content_type: &'static str,
    ) -> Result<OutboundResponse, OriginError> {
        let outcome = RangeParseResult::NotRequested;
        let (content, total_size) = match (resp.content_length(), head) {
            (Some(total_size), true) => (Content::Headless, total_size),
            (Some(total_size), false) => (Content::Exact(resp.into_body()), total_size),
            (None, true) => return Err(OriginError::MissingLength),
            (None, false) => {
                let bytes = resp.collect(self.settings.max_buffer_bytes).await?;
                let total_size = bytes.len() as u64;
                (Content::Buffered(bytes), total_size)
            }
        };

        self.report_range(path, &outcome, total_size);
        let descriptor = ContentDescriptor {
            content_type,
            total_size,
        };
        Ok(self.synthesizer.synthesize(&outcome, content, &descriptor))
    }

    fn report_range(&self, path: &str, outcome: &RangeParseResult, total_size: u64) {
        self.events.emit(&EngineEvent::RangeParsed {
            path,
            outcome,
            total_size,
        });
    }
}

fn invalid_content_range(resp: &OriginResponse) -> OriginError {
    OriginError::InvalidContentRange(resp.content_range().unwrap_or("<missing>").to_string())
}
