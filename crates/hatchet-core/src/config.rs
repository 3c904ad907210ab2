//! Service endpoints and transport settings.
//!
//! The base URLs are fixed for the lifetime of a client. Overriding them is
//! only useful for pointing a client at a staging or mock server.

use std::time::Duration;

/// Base URL for authentication endpoints (login, refresh, access fetch)
pub const AUTH_BASE_URL: &str = "https://auth.hatchet.is/v1/";

/// Base URL for API endpoints (playback log submission)
pub const API_BASE_URL: &str = "https://api.hatchet.is/v2/";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub auth_base_url: String,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auth_base_url: AUTH_BASE_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    /// Config pointing both auth and API at the given base URLs.
    pub fn with_base_urls(auth_base_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        join_url(&self.auth_base_url, path)
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        join_url(&self.api_base_url, path)
    }

    pub(crate) fn build_http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ServiceConfig::default();
        assert_eq!(
            config.auth_url("authentication/password"),
            "https://auth.hatchet.is/v1/authentication/password"
        );
        assert_eq!(
            config.api_url("playbacklogEntries"),
            "https://api.hatchet.is/v2/playbacklogEntries"
        );
    }

    #[test]
    fn test_join_without_trailing_slash() {
        let config = ServiceConfig::with_base_urls("http://127.0.0.1:8080", "http://127.0.0.1:8080/api");
        assert_eq!(config.auth_url("tokens/fetch/calumet"), "http://127.0.0.1:8080/tokens/fetch/calumet");
        assert_eq!(config.api_url("/playbacklogEntries"), "http://127.0.0.1:8080/api/playbacklogEntries");
    }
}
