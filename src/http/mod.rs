//! HTTP protocol layer module
//!
//! Range parsing, content types, cache hints and response synthesis. Nothing
//! here depends on the server runtime; the hyper adapter lives in `handler`.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteInterval, RangeError, RangeParseResult};
pub use response::{
    BodyError, BodyStream, Content, ContentDescriptor, OutboundResponse, ResponseBody,
    ResponseSynthesizer,
};
