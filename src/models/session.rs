use serde::Serialize;

use super::token::TokenPair;
use super::user::UserProfile;

/// Where the session currently stands.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Anonymous,
    /// A stored pair is being checked against the backend.
    Restoring,
    /// A provider token is being exchanged.
    Authenticating,
    Authenticated,
}

/// The in-memory record of the current authentication status.
///
/// `is_authenticated` and `is_loading` are derived from the phase so they can
/// never disagree with it.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
    pub phase: SessionPhase,
}

impl Session {
    pub fn anonymous() -> Self {
        Session::default()
    }

    /// A session waiting on the network, without credentials yet.
    pub fn pending(phase: SessionPhase) -> Self {
        Session {
            phase,
            ..Session::default()
        }
    }

    pub fn authenticated(pair: TokenPair, user: UserProfile) -> Self {
        Session {
            access_token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
            user: Some(user),
            phase: SessionPhase::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Restoring | SessionPhase::Authenticating
        )
    }
}
