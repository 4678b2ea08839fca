//! Engine stage events
//!
//! The engine reports what it does through an injected [`EventSink`] rather
//! than logging inline. Events borrow from the request being handled.

use crate::http::range::RangeParseResult;
use crate::origin::OriginError;

#[derive(Debug, Clone, Copy)]
pub enum EngineEvent<'a> {
    RequestReceived {
        method: &'a str,
        path: &'a str,
        range: Option<&'a str>,
    },
    RangeParsed {
        path: &'a str,
        outcome: &'a RangeParseResult,
        total_size: u64,
    },
    /// One per origin round trip; `error` is set when no response came back
    /// or the response was unusable
    OriginResult {
        path: &'a str,
        status: Option<u16>,
        error: Option<&'a OriginError>,
    },
    ResponseEmitted {
        path: &'a str,
        status: u16,
        content_length: Option<u64>,
    },
}

impl EngineEvent<'_> {
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::RequestReceived { .. } => "request_received",
            Self::RangeParsed { .. } => "range_parsed",
            Self::OriginResult { .. } => "origin_result",
            Self::ResponseEmitted { .. } => "response_emitted",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent<'_>);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EngineEvent<'_>) {}
}
