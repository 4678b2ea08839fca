//! Stateless HTTP range-request proxy
//!
//! Re-exposes files from an origin store and serves RFC 7233 single byte
//! ranges for clients that download in chunks, whatever the origin's own
//! Range support.

pub mod config;
pub mod engine;
pub mod handler;
pub mod http;
pub mod logger;
pub mod origin;
pub mod server;
