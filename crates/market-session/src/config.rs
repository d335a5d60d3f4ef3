//! Session configuration.
//!
//! Endpoint, credentials and cache settings for the role session layer.
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SessionError;

/// Default cache key for persisted role data.
pub const DEFAULT_CACHE_KEY: &str = "market_role_data";

/// Role authority endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityEndpoint {
    /// Base URL (e.g. "https://market.example.com").
    pub base_url: String,

    /// API key sent as a bearer token.
    pub api_key: Option<String>,
}

impl AuthorityEndpoint {
    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Check if API key authentication is available.
    pub fn has_auth(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Role authority endpoint.
    pub authority: AuthorityEndpoint,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum attempts for idempotent authority reads.
    pub max_retries: u32,

    /// Directory for the file cache. `None` selects the in-memory cache.
    pub cache_dir: Option<PathBuf>,

    /// Cache key for persisted role data.
    pub cache_key: String,
}

impl Default for SessionConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            authority: AuthorityEndpoint {
                base_url: "http://localhost:3000".to_string(),
                api_key: None,
            },
            timeout_secs: 30,
            max_retries: 3,
            cache_dir: None,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ROLE_AUTHORITY_URL`: Role authority URL (default: http://localhost:3000)
    /// - `ROLE_AUTHORITY_API_KEY`: Role authority API key
    /// - `ROLE_AUTHORITY_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `ROLE_AUTHORITY_MAX_RETRIES`: Maximum read attempts (default: 3)
    /// - `ROLE_CACHE_DIR`: Directory for the file cache (default: in-memory)
    /// - `ROLE_CACHE_KEY`: Cache key (default: market_role_data)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            authority: AuthorityEndpoint {
                base_url: std::env::var("ROLE_AUTHORITY_URL").unwrap_or(default.authority.base_url),
                api_key: std::env::var("ROLE_AUTHORITY_API_KEY").ok(),
            },
            timeout_secs: std::env::var("ROLE_AUTHORITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
            max_retries: std::env::var("ROLE_AUTHORITY_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_retries),
            cache_dir: std::env::var("ROLE_CACHE_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            cache_key: std::env::var("ROLE_CACHE_KEY")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(default.cache_key),
        }
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate that required configuration is present for production.
    pub fn validate_for_production(&self) -> Result<(), SessionError> {
        if self.authority.api_key.is_none() {
            return Err(SessionError::ConfigError(
                "missing ROLE_AUTHORITY_API_KEY".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(SessionError::ConfigError(
                "ROLE_AUTHORITY_MAX_RETRIES must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
