use reqwest::StatusCode;
use thiserror::Error;

/// Failures while acquiring credentials.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Authentication service error (status {status}): {body}")]
    ServiceError { status: StatusCode, body: String },

    #[error("Network error during authentication: {0}")]
    Network(reqwest::Error),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Could not build authentication request: {0}")]
    Request(reqwest::Error),
}

/// Failures while submitting to the API.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(reqwest::Error),

    #[error("HTTP error (status {status}): {body}")]
    Http { status: StatusCode, body: String },

    #[error("Could not build request: {0}")]
    Request(reqwest::Error),

    #[error("Could not encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

impl AuthError {
    pub(crate) fn service(status: StatusCode, body: &str) -> Self {
        AuthError::ServiceError {
            status,
            body: truncate_body(body),
        }
    }

    /// Classify a failed `send()` on an auth request.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            AuthError::Request(err)
        } else {
            AuthError::Network(err)
        }
    }
}

impl Error {
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        Error::Http {
            status,
            body: truncate_body(body),
        }
    }

    /// Classify a failed `send()` on a submission. Anything past the builder
    /// stage is a transport fault: connect, timeout, redirect loop, broken body.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Error::Request(err)
        } else {
            Error::Network(err)
        }
    }

    /// Whether a later retry of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Auth(AuthError::Network(_)) => true,
            Error::Auth(_) | Error::Http { .. } | Error::Request(_) | Error::Encode(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Auth(AuthError::ServiceError { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");

        let long = "x".repeat(600);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let long = "é".repeat(400); // 800 bytes, 2 per char
        let truncated = truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_permanent_errors_are_not_transient() {
        assert!(!Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom").is_transient());
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_transient());
        assert!(!Error::Auth(AuthError::service(StatusCode::BAD_GATEWAY, "")).is_transient());
        assert!(!Error::Auth(AuthError::InvalidResponse("eof".into())).is_transient());
    }

    #[test]
    fn test_status_accessor() {
        let err = Error::from_status(StatusCode::NOT_FOUND, "missing");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(Error::Auth(AuthError::InvalidCredentials).status(), None);
    }
}
