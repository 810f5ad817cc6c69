//! Error kinds surfaced by the session core.

use reqwest::StatusCode;
use serde_json::Value;

/// Everything that can go wrong while acquiring, using or dropping a session.
///
/// None of these are fatal: every path that produces one leaves the session
/// either anonymous or authenticated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The backend could not be reached, or the call timed out.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The backend or the identity provider declined the credentials.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The access token was refused even after the single refresh attempt.
    #[error("access token expired")]
    TokenExpired,

    /// The persisted token record could not be understood.
    #[error("malformed persisted state: {0}")]
    MalformedPersistedState(String),

    /// Any other non-success status from the backend.
    #[error("request failed with HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A success status whose body did not have the expected shape.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// The external sign-in step (redirect or popup) did not yield a token.
    #[error("provider sign-in failed: {0}")]
    Provider(String),

    #[error("a login attempt is already in progress")]
    LoginInProgress,

    /// A logout happened while the operation was waiting on the network.
    #[error("signed out before the operation completed")]
    SignedOut,

    #[error("storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Maps a non-success backend response to an error kind.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = error_message_from_body(body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SessionError::AuthRejected(message),
            _ => SessionError::Http {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// True for the kinds that mean "these credentials are no good".
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SessionError::AuthRejected(_) | SessionError::TokenExpired
        )
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SessionError::NetworkFailure(format!("request timed out: {}", e))
        } else if e.is_decode() {
            SessionError::InvalidResponse(e.to_string())
        } else {
            SessionError::NetworkFailure(e.to_string())
        }
    }
}

/// Pulls a human readable message out of a REST error body.
///
/// Understands the usual `{"detail": ...}`, `{"error": ...}` and
/// `{"non_field_errors": [...]}` shapes; falls back to the raw text.
pub fn error_message_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return Some(truncate(trimmed, 200));
    };

    for key in ["detail", "error", "message"] {
        if let Some(text) = json.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    if let Some(first) = json
        .get("non_field_errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(Value::as_str)
    {
        return Some(first.to_string());
    }

    Some(truncate(trimmed, 200))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
