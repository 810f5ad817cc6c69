use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::value::value_to_string;

/// The user record handed back by the backend.
///
/// The session core never interprets it; only the view reads a few
/// well-known fields for display.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct UserProfile(Value);

impl UserProfile {
    pub fn new(value: Value) -> Self {
        UserProfile(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// A top-level field rendered as sanitized text, if present and not null.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value_to_string(value.clone())),
        }
    }

    /// "first last", whichever parts are set.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<String> = ["first_name", "last_name"]
            .iter()
            .filter_map(|key| self.field(key))
            .filter(|part| !part.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.field("username")
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn email(&self) -> Option<String> {
        self.field("email")
    }

    /// Backend primary key (`pk`, or `id` for backends that use that name).
    pub fn id(&self) -> Option<String> {
        self.field("pk").or_else(|| self.field("id"))
    }
}

impl From<Value> for UserProfile {
    fn from(value: Value) -> Self {
        UserProfile(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_fields() {
        let user = UserProfile::new(json!({
            "pk": 42,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "extra": {"nested": true}
        }));

        assert_eq!(user.display_name().as_deref(), Some("Ada Lovelace"));
        assert_eq!(user.email().as_deref(), Some("ada@example.com"));
        assert_eq!(user.id().as_deref(), Some("42"));
        assert_eq!(user.field("missing"), None);
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let user = UserProfile::new(json!({"username": "ada", "first_name": ""}));
        assert_eq!(user.display_name().as_deref(), Some("ada"));
    }

    #[test]
    fn test_profile_round_trips_opaquely() {
        let raw = json!({"pk": 1, "groups": ["a", "b"]});
        let user: UserProfile = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);
    }
}
