//! Lazy acquisition of the refresh -> bearer -> access token chain.

use std::fmt;

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::AuthError;

use super::Token;

const LOGIN_PATH: &str = "authentication/password";
const REFRESH_BEARER_PATH: &str = "tokens/refresh/bearer";
const FETCH_ACCESS_PATH: &str = "tokens/fetch/calumet";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: String,
    refresh_token_expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Furthest link of the chain that is currently valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    NoCredentials,
    HaveRefresh,
    HaveBearer,
    HaveAccess,
}

#[derive(Debug, Default)]
struct TokenChain {
    refresh: Token,
    bearer: Token,
    access: Token,
}

impl TokenChain {
    fn state(&self) -> ChainState {
        if self.access.is_valid() {
            ChainState::HaveAccess
        } else if self.bearer.is_valid() {
            ChainState::HaveBearer
        } else if self.refresh.is_valid() {
            ChainState::HaveRefresh
        } else {
            ChainState::NoCredentials
        }
    }

    fn clear(&mut self) {
        self.refresh.clear();
        self.bearer.clear();
        self.access.clear();
    }
}

/// Owns the credential chain for one user.
///
/// The chain lock is held for a whole `ensure_access_token` call, so two
/// concurrent callers never both run the refresh steps.
pub struct CredentialManager {
    http: Client,
    config: ServiceConfig,
    username: String,
    password: String,
    chain: Mutex<TokenChain>,
}

impl CredentialManager {
    pub fn new(
        http: Client,
        config: ServiceConfig,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            config,
            username: username.into(),
            password: password.into(),
            chain: Mutex::new(TokenChain::default()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn state(&self) -> ChainState {
        self.chain.lock().await.state()
    }

    /// Drop every token; the next call starts again from password login.
    pub async fn invalidate(&self) {
        self.chain.lock().await.clear();
    }

    /// Return a valid access token, acquiring only the links that have expired.
    pub async fn ensure_access_token(&self) -> Result<String, AuthError> {
        let mut chain = self.chain.lock().await;
        if chain.access.is_valid() {
            return Ok(chain.access.value().to_string());
        }

        self.ensure_bearer(&mut chain).await?;
        self.fetch_access(&mut chain).await?;
        Ok(chain.access.value().to_string())
    }

    async fn ensure_bearer(&self, chain: &mut TokenChain) -> Result<(), AuthError> {
        if chain.bearer.is_valid() {
            return Ok(());
        }
        if chain.refresh.is_valid() {
            self.refresh_bearer(chain).await
        } else {
            self.login(chain).await
        }
    }

    async fn login(&self, chain: &mut TokenChain) -> Result<(), AuthError> {
        debug!(username = %self.username, "Logging in with password");

        let response = self
            .http
            .post(self.config.auth_url(LOGIN_PATH))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(AuthError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            chain.clear();
            if is_bad_credentials(status) {
                warn!(username = %self.username, status = %status, "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::service(status, &body));
        }

        let login: LoginResponse = read_json(response).await?;
        chain.bearer.update(login.access_token, login.expires_in);
        chain
            .refresh
            .update(login.refresh_token, login.refresh_token_expires_in);

        info!(username = %self.username, "Logged in");
        Ok(())
    }

    async fn refresh_bearer(&self, chain: &mut TokenChain) -> Result<(), AuthError> {
        debug!("Refreshing bearer token");

        let response = self
            .http
            .post(self.config.auth_url(REFRESH_BEARER_PATH))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", chain.refresh.value()),
            ])
            .send()
            .await
            .map_err(AuthError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            // Next attempt falls back to password login
            chain.refresh.clear();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Bearer refresh rejected");
            return Err(AuthError::service(status, &body));
        }

        let token: TokenResponse = read_json(response).await?;
        chain.bearer.update(token.access_token, token.expires_in);
        Ok(())
    }

    async fn fetch_access(&self, chain: &mut TokenChain) -> Result<(), AuthError> {
        debug!("Fetching access token");

        let response = self
            .http
            .get(self.config.auth_url(FETCH_ACCESS_PATH))
            .bearer_auth(chain.bearer.value())
            .send()
            .await
            .map_err(AuthError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            chain.bearer.clear();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Access token fetch rejected");
            return Err(AuthError::service(status, &body));
        }

        let token: TokenResponse = read_json(response).await?;
        chain.access.update(token.access_token, token.expires_in);
        Ok(())
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("username", &self.username)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Statuses the login endpoint uses for a wrong username or password.
/// Other 4xx (408, 429, ...) are service conditions, not bad credentials.
fn is_bad_credentials(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let text = response.text().await.map_err(AuthError::Network)?;
    serde_json::from_str(&text).map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager_for(server: &MockServer) -> CredentialManager {
        let config = ServiceConfig::with_base_urls(server.uri(), server.uri());
        let http = config.build_http_client().unwrap();
        CredentialManager::new(http, config, "alice", "hunter2")
    }

    async fn mount_login(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/authentication/password"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=alice"))
            .and(body_string_contains("password=hunter2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "B1",
                "expires_in": 3600,
                "refresh_token": "R1",
                "refresh_token_expires_in": 86400
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mount_fetch(server: &MockServer, bearer: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/tokens/fetch/calumet"))
            .and(header("Authorization", format!("Bearer {}", bearer).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A1",
                "expires_in": 900
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mount_refresh(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/tokens/refresh/bearer"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=R0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "B2",
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_cold_start_logs_in_then_fetches_access() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        mount_refresh(&server, 0).await;
        mount_fetch(&server, "B1", 1).await;

        let manager = manager_for(&server);
        assert_eq!(manager.state().await, ChainState::NoCredentials);

        let token = manager.ensure_access_token().await.unwrap();
        assert_eq!(token, "A1");
        assert_eq!(manager.state().await, ChainState::HaveAccess);

        // Second call within the access lifetime makes no network calls
        let token = manager.ensure_access_token().await.unwrap();
        assert_eq!(token, "A1");
    }

    #[tokio::test]
    async fn test_login_sets_bearer_and_refresh_lifetimes() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        mount_fetch(&server, "B1", 2).await;

        let manager = manager_for(&server);
        manager.ensure_access_token().await.unwrap();

        {
            let chain = manager.chain.lock().await;
            assert_eq!(chain.bearer.value(), "B1");
            assert_eq!(chain.refresh.value(), "R1");
            let now = chrono::Utc::now();
            assert!(chain.bearer.is_valid_at(now + chrono::Duration::seconds(3500)));
            assert!(!chain.bearer.is_valid_at(now + chrono::Duration::seconds(3600)));
            assert!(chain.refresh.is_valid_at(now + chrono::Duration::seconds(86000)));
        }

        // Access expired, bearer still valid: only the access fetch runs
        manager.chain.lock().await.access.clear();
        assert_eq!(manager.state().await, ChainState::HaveBearer);
        assert_eq!(manager.ensure_access_token().await.unwrap(), "A1");
    }

    #[tokio::test]
    async fn test_expired_bearer_uses_refresh_token() {
        let server = MockServer::start().await;
        mount_login(&server, 0).await;
        mount_refresh(&server, 1).await;
        mount_fetch(&server, "B2", 1).await;

        let manager = manager_for(&server);
        manager.chain.lock().await.refresh.update("R0".to_string(), 86400);
        assert_eq!(manager.state().await, ChainState::HaveRefresh);

        assert_eq!(manager.ensure_access_token().await.unwrap(), "A1");
        assert_eq!(manager.chain.lock().await.bearer.value(), "B2");
    }

    #[tokio::test]
    async fn test_bad_password_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/password"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad credentials"))
            .expect(1)
            .mount(&server)
            .await;
        mount_fetch(&server, "B1", 0).await;

        let manager = manager_for(&server);
        let err = manager.ensure_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(manager.state().await, ChainState::NoCredentials);
    }

    #[tokio::test]
    async fn test_login_server_error_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/password"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        match manager.ensure_access_token().await.unwrap_err() {
            AuthError::ServiceError { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_refresh_falls_back_to_login_next_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/refresh/bearer"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        mount_login(&server, 1).await;
        mount_fetch(&server, "B1", 1).await;

        let manager = manager_for(&server);
        manager.chain.lock().await.refresh.update("R0".to_string(), 86400);

        let err = manager.ensure_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::ServiceError { .. }));
        assert_eq!(manager.state().await, ChainState::NoCredentials);

        assert_eq!(manager.ensure_access_token().await.unwrap(), "A1");
    }

    #[tokio::test]
    async fn test_rate_limited_login_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/password"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        match manager.ensure_access_token().await.unwrap_err() {
            AuthError::ServiceError { status, .. } => assert_eq!(status.as_u16(), 429),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_credential_statuses() {
        assert!(is_bad_credentials(StatusCode::BAD_REQUEST));
        assert!(is_bad_credentials(StatusCode::UNAUTHORIZED));
        assert!(is_bad_credentials(StatusCode::FORBIDDEN));
        assert!(!is_bad_credentials(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_bad_credentials(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_bad_credentials(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_rejected_fetch_falls_back_to_refresh_next_time() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/tokens/fetch/calumet"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tokens/refresh/bearer"))
            .and(body_string_contains("refresh_token=R1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "B2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_fetch(&server, "B2", 1).await;

        let manager = manager_for(&server);
        let err = manager.ensure_access_token().await.unwrap_err();
        match err {
            AuthError::ServiceError { status, .. } => assert_eq!(status.as_u16(), 401),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(manager.state().await, ChainState::HaveRefresh);

        // Bearer re-derived from the refresh token; login runs only once overall
        assert_eq!(manager.ensure_access_token().await.unwrap(), "A1");
        assert_eq!(manager.chain.lock().await.bearer.value(), "B2");
    }

    #[tokio::test]
    async fn test_unbuildable_request_is_request_error() {
        let config = ServiceConfig::with_base_urls("not a url", "not a url");
        let http = config.build_http_client().unwrap();
        let manager = CredentialManager::new(http, config, "alice", "hunter2");

        let err = manager.ensure_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Request(_)));
        assert!(!crate::Error::from(err).is_transient());
    }

    #[tokio::test]
    async fn test_malformed_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "B1" })))
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let err = manager.ensure_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let config = ServiceConfig::with_base_urls("http://127.0.0.1:1", "http://127.0.0.1:1");
        let http = config.build_http_client().unwrap();
        let manager = CredentialManager::new(http, config, "alice", "hunter2");

        let err = manager.ensure_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
    }

    #[tokio::test]
    async fn test_invalidate_clears_chain() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        mount_fetch(&server, "B1", 1).await;

        let manager = manager_for(&server);
        manager.ensure_access_token().await.unwrap();
        manager.invalidate().await;
        assert_eq!(manager.state().await, ChainState::NoCredentials);
    }
}
