// Configuration module entry point
// Loads the TOML file and environment overrides into typed configuration

mod types;

use std::net::SocketAddr;

use config::{ConfigError, Environment, File, FileFormat};

pub use types::{
    Config, FetchStrategy, HealthConfig, HttpConfig, LoggingConfig, OriginConfig,
    PerformanceConfig, ServerConfig,
};

/// Environment variable prefix, e.g. `RANGE_PROXY__ORIGIN__BASE_URL`
const ENV_PREFIX: &str = "RANGE_PROXY";

impl Config {
    /// Load configuration from specified file path (extension optional)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::build(File::with_name(config_path).required(false))
    }

    /// Load configuration from TOML text (environment still applies)
    pub fn load_from_str(toml: &str) -> Result<Self, ConfigError> {
        Self::build(File::from_str(toml, FileFormat::Toml))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("origin.range_suffixes"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("origin.connect_timeout", 10)?
            .set_default("origin.request_timeout", 120)?
            .set_default("origin.user_agent", concat!("hap-range-proxy/", env!("CARGO_PKG_VERSION")))?
            .set_default("http.cache_policy", "public")?
            .set_default("http.cache_max_age", 86_400)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.events", false)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.header_read_timeout", 30)?
            .set_default("performance.shutdown_grace", 30)?
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the proxy cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.origin.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "origin.base_url must be an http(s) URL, got '{base}'"
            )));
        }
        reqwest::Url::parse(base)
            .map_err(|e| ConfigError::Message(format!("Invalid origin.base_url '{base}': {e}")))?;

        if self.origin.request_timeout == 0 {
            return Err(ConfigError::Message(
                "origin.request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
