//! HTTP backend configuration.

use std::time::Duration;

use log::warn;

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "PARLOR_API_BASE_URL";

/// Environment variable overriding the request timeout, in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "PARLOR_REQUEST_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for [`crate::HttpChatBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the chat API, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to the request/response endpoints. The streaming
    /// endpoint is exempt; a reply may legitimately take longer than any
    /// single round trip.
    pub request_timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HttpBackendConfig {
    /// Build a config from environment overrides, falling back to defaults
    /// on anything missing or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            let url = url.trim();
            if url.is_empty() {
                warn!("Ignoring empty {}", BASE_URL_ENV);
            } else {
                config.base_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(raw) = std::env::var(REQUEST_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => warn!(
                    "Invalid {} '{}', keeping {}s",
                    REQUEST_TIMEOUT_ENV,
                    raw,
                    config.request_timeout.as_secs()
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = HttpBackendConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000/api");
        assert!(!config.base_url.ends_with('/'));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }
}
