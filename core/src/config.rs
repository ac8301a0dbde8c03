//! Client configuration.

use std::time::Duration;

use crate::error::ApiError;

/// Public API root of the hosted service.
pub const DEFAULT_BASE_URL: &str = "https://api.bagelstudio.co/api/public";
pub const DEFAULT_ACCEPT_VERSION: &str = "v1";

pub const TOKEN_ENV: &str = "BAGEL_API_TOKEN";
pub const BASE_URL_ENV: &str = "BAGEL_BASE_URL";

/// Settings for `BagelClient` and `BagelDb`. Immutable once a client is built.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub base_url: String,
    pub accept_version: String,
    /// Global per-request timeout for the default transport. `None` keeps
    /// the transport's own default.
    pub timeout: Option<Duration>,
    /// Log per-page progress while listing collections.
    pub progress: bool,
}

impl Config {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            accept_version: DEFAULT_ACCEPT_VERSION.to_string(),
            timeout: None,
            progress: false,
        }
    }

    /// Read `BAGEL_API_TOKEN` and, if set, `BAGEL_BASE_URL`.
    pub fn from_env() -> Result<Self, ApiError> {
        let token = std::env::var(TOKEN_ENV).map_err(|_| ApiError::MissingConfig(TOKEN_ENV))?;
        let mut config = Self::new(token);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config = config.base_url(base_url);
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn accept_version(mut self, version: impl Into<String>) -> Self {
        self.accept_version = version.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_api() {
        let config = Config::new("tok");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.accept_version, "v1");
        assert!(config.timeout.is_none());
        assert!(!config.progress);
    }

    #[test]
    fn builder_overrides() {
        let config = Config::new("tok")
            .base_url("http://localhost:3000")
            .timeout(Duration::from_secs(5))
            .progress(true);
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(config.progress);
    }
}
