use std::sync::Arc;

use tracing::{debug, warn};

use super::Storage;
use crate::error::SessionError;
use crate::models::TokenPair;

/// Persists the access/refresh pair as a single JSON record under one key.
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    key: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        TokenStore {
            storage,
            key: key.into(),
        }
    }

    /// Overwrites the persisted pair in one step.
    pub fn save(&self, pair: &TokenPair) -> Result<(), SessionError> {
        if !pair.is_complete() {
            return Err(SessionError::Storage(
                "refusing to persist a token pair with an empty field".to_string(),
            ));
        }
        let record = serde_json::to_string(pair)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize tokens: {}", e)))?;
        self.storage
            .set_item(&self.key, &record)
            .map_err(SessionError::Storage)?;
        debug!("Persisted token pair under '{}'", self.key);
        Ok(())
    }

    /// The stored pair, or `None`. A malformed record is removed and reported
    /// as absent.
    pub fn load(&self) -> Option<TokenPair> {
        match self.read_record() {
            Ok(pair) => pair,
            Err(SessionError::MalformedPersistedState(reason)) => {
                warn!("Discarding malformed token record '{}': {}", self.key, reason);
                self.clear();
                None
            }
            Err(e) => {
                warn!("Could not read token record '{}': {}", self.key, e);
                None
            }
        }
    }

    /// Like `load`, but reports what it found without healing anything.
    pub fn read_record(&self) -> Result<Option<TokenPair>, SessionError> {
        let raw = self
            .storage
            .get_item(&self.key)
            .map_err(SessionError::Storage)?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let record: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| SessionError::MalformedPersistedState(e.to_string()))?;
        // Derived `Deserialize` would also accept a sequence.
        if !record.is_object() {
            return Err(SessionError::MalformedPersistedState(
                "token record is not a JSON object".to_string(),
            ));
        }
        let pair: TokenPair = serde_json::from_value(record)
            .map_err(|e| SessionError::MalformedPersistedState(e.to_string()))?;
        if !pair.is_complete() {
            return Err(SessionError::MalformedPersistedState(
                "token record has an empty field".to_string(),
            ));
        }
        Ok(Some(pair))
    }

    /// Removes the persisted pair. Never fails; backend errors are only logged.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(&self.key) {
            warn!("Failed to remove token record '{}': {}", self.key, e);
        } else {
            debug!("Cleared token record '{}'", self.key);
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.load().map(|pair| pair.access_token)
    }

    /// Swaps in a refreshed access token, keeping the refresh token.
    pub fn update_access_token(&self, access_token: &str) -> Result<TokenPair, SessionError> {
        let current = self.load().ok_or_else(|| {
            SessionError::AuthRejected("session was cleared while refreshing".to_string())
        })?;
        let updated = current.with_access_token(access_token);
        self.save(&updated)?;
        Ok(updated)
    }
}
