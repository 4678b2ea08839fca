// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

use crate::http::cache::{CacheMode, CachePolicy};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub origin: OriginConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// How the origin is asked for bytes
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Forward the Range header and relay the origin's partial response
    Passthrough,
    /// HEAD for the size, then GET the whole body and slice locally
    ProbeThenSlice,
    /// Single whole-body GET, size taken from that same response
    #[default]
    FetchAndSlice,
}

/// Origin configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OriginConfig {
    /// Base URL prepended to every inbound path
    pub base_url: String,
    #[serde(default)]
    pub strategy: FetchStrategy,
    /// Path suffixes that get range handling; empty means every path
    #[serde(default)]
    pub range_suffixes: Vec<String>,
    /// Connect timeout in seconds
    pub connect_timeout: u64,
    /// Whole-request timeout in seconds, body transfer included
    pub request_timeout: u64,
    /// Refuse to buffer bodies larger than this for local slicing
    #[serde(default)]
    pub max_buffer_bytes: Option<u64>,
    pub user_agent: String,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub cache_policy: CacheMode,
    pub cache_max_age: u32,
    pub max_body_size: u64,
    /// Plain-text greeting served at `/`; `/` is proxied when unset
    #[serde(default)]
    pub banner: Option<String>,
}

impl HttpConfig {
    pub const fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(self.cache_policy, self.cache_max_age)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
    /// Emit one line per engine stage
    pub events: bool,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds allowed for a client to send request headers
    pub header_read_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_grace: u64,
}

/// Health check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}
