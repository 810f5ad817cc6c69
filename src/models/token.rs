use serde::{Deserialize, Serialize};

use super::user::UserProfile;
use crate::error::SessionError;

/// The persisted access/refresh pair.
///
/// Both tokens are present and non-empty, or the pair does not exist at all.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        TokenPair {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// A pair with an empty field is as good as a missing one.
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }

    /// Same refresh token, freshly minted access token.
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        TokenPair {
            access_token: access_token.into(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Body returned by the provider-token exchange endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: UserProfile,
}

impl LoginResponse {
    /// Splits the response into the pair to persist and the user to publish.
    /// A response missing either token is rejected rather than half-stored.
    pub fn into_parts(self) -> Result<(TokenPair, UserProfile), SessionError> {
        let pair = match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) => TokenPair::new(access, refresh),
            _ => {
                return Err(SessionError::InvalidResponse(
                    "login response is missing access_token or refresh_token".to_string(),
                ))
            }
        };
        if !pair.is_complete() {
            return Err(SessionError::InvalidResponse(
                "login response contains an empty token".to_string(),
            ));
        }
        Ok((pair, self.user))
    }
}

/// Body returned by the refresh endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct RefreshResponse {
    pub access: String,
}

/// Masked form of a token for logs and terminal output.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 12 {
        return "***".to_string();
    }
    let head: String = token.chars().take(6).collect();
    format!("{}...", head)
}
