//! Origin error module
//!
//! Failures talking to the origin. Only `NotFound` is visible to clients
//! (as a 404); everything else becomes a generic 500.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("resource not found at origin")]
    NotFound,

    #[error("origin answered with status {0}")]
    Status(u16),

    #[error("origin ignored the forwarded range (status {0})")]
    RangeIgnored(u16),

    #[error("origin sent an unusable Content-Range: {0}")]
    InvalidContentRange(String),

    #[error("origin did not report a content length")]
    MissingLength,

    #[error("origin size changed between requests: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("resource of {size} bytes exceeds the {limit} byte buffer limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("origin request timed out")]
    Timeout,

    #[error("origin unreachable: {0}")]
    Unreachable(String),

    #[error("origin body error: {0}")]
    Body(String),

    #[error("invalid origin url: {0}")]
    InvalidUrl(String),
}

impl OriginError {
    /// Status code surfaced to the client
    pub const fn client_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            _ => 500,
        }
    }

    /// Upstream status, when the failure came with one
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::NotFound => Some(404),
            Self::Status(s) | Self::RangeIgnored(s) => Some(*s),
            _ => None,
        }
    }
}
