//! Engine events written through the logger

use crate::engine::{EngineEvent, EventSink};
use crate::http::range::RangeParseResult;

/// Writes one line per engine stage; origin failures always reach the error log
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    stages: bool,
}

impl LogSink {
    /// `stages` enables the per-stage lines (`logging.events`)
    pub const fn new(stages: bool) -> Self {
        Self { stages }
    }
}

impl EventSink for LogSink {
    fn emit(&self, event: &EngineEvent<'_>) {
        if let EngineEvent::OriginResult {
            path,
            error: Some(err),
            ..
        } = event
        {
            super::log_warning(&format!("[Origin] {path}: {err}"));
        }

        if self.stages {
            super::log_info(&format_event(event));
        }
    }
}

pub(super) fn format_event(event: &EngineEvent<'_>) -> String {
    let detail = match event {
        EngineEvent::RequestReceived {
            method,
            path,
            range,
        } => format!("{method} {path} range={}", range.unwrap_or("-")),
        EngineEvent::RangeParsed {
            path,
            outcome,
            total_size,
        } => {
            let outcome = match outcome {
                RangeParseResult::Valid(interval) => interval.content_range(*total_size),
                RangeParseResult::NotRequested => format!("full/{total_size}"),
                RangeParseResult::NotSatisfiable(e) => format!("rejected: {e}"),
            };
            format!("{path} {outcome}")
        }
        EngineEvent::OriginResult {
            path,
            status,
            error,
        } => match (status, error) {
            (_, Some(err)) => format!("{path} error={err}"),
            (Some(status), None) => format!("{path} status={status}"),
            (None, None) => format!("{path} no response"),
        },
        EngineEvent::ResponseEmitted {
            path,
            status,
            content_length,
        } => match content_length {
            Some(len) => format!("{path} status={status} length={len}"),
            None => format!("{path} status={status}"),
        },
    };
    format!("[Event] {} {detail}", event.stage())
}
