//! HTTP cache control module
//!
//! The proxy keeps no cache of its own; it only hands clients a freshness hint.

use serde::{Deserialize, Serialize};

/// Cache mode as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Public,
    Private,
    NoCache,
    NoStore,
}

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// Private cache (browser cache only)
    Private(u32),
    /// No cache
    NoCache,
    /// No store
    NoStore,
}

impl CachePolicy {
    pub const fn new(mode: CacheMode, max_age: u32) -> Self {
        match mode {
            CacheMode::Public => Self::Public(max_age),
            CacheMode::Private => Self::Private(max_age),
            CacheMode::NoCache => Self::NoCache,
            CacheMode::NoStore => Self::NoStore,
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::Private(max_age) => format!("private, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
            Self::NoStore => "no-store".to_string(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Public(86_400) // 1 day
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_policy() {
        assert_eq!(
            CachePolicy::Public(3600).to_header_value(),
            "public, max-age=3600"
        );
        assert_eq!(
            CachePolicy::Private(600).to_header_value(),
            "private, max-age=600"
        );
        assert_eq!(CachePolicy::NoCache.to_header_value(), "no-cache");
        assert_eq!(CachePolicy::NoStore.to_header_value(), "no-store");
        assert_eq!(
            CachePolicy::default().to_header_value(),
            "public, max-age=86400"
        );
    }

    #[test]
    fn test_policy_from_mode() {
        assert_eq!(CachePolicy::new(CacheMode::Public, 60), CachePolicy::Public(60));
        assert_eq!(CachePolicy::new(CacheMode::NoStore, 60), CachePolicy::NoStore);
    }
}
