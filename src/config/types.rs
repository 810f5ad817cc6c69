use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;

/// Prefix for environment overrides, e.g. `DASHAUTH_GOOGLE__CLIENT_ID`.
pub const ENV_PREFIX: &str = "DASHAUTH_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0. Read once at startup and never mutated.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    /// Base URL of the REST backend, e.g. "http://localhost:8000/api".
    pub api_base_url: String,
    pub google: GoogleConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity provider settings.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Backend path that starts the provider redirect dance.
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_scope() -> String {
    "openid email profile".to_string()
}

fn default_login_path() -> String {
    "/oauth/google/login/".to_string()
}

/// The two ways of obtaining a provider token. Exactly one is used per process.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
pub enum AuthFlow {
    #[default]
    #[serde(rename = "redirect")]
    Redirect,
    #[serde(rename = "popup")]
    Popup,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct AuthConfig {
    #[serde(default)]
    pub flow: AuthFlow,
    /// Upper bound for every backend call.
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    /// Where the redirect listener binds; port 0 picks a free port.
    #[serde(default = "default_callback_bind_address")]
    pub callback_bind_address: String,
    /// How long to wait for the provider to come back.
    #[serde(default = "default_callback_timeout_in_secs")]
    pub callback_timeout_in_secs: u64,
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            flow: AuthFlow::default(),
            timeout_in_ms: default_timeout_in_ms(),
            callback_bind_address: default_callback_bind_address(),
            callback_timeout_in_secs: default_callback_timeout_in_secs(),
            open_browser: default_open_browser(),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

fn default_callback_bind_address() -> String {
    "127.0.0.1:0".to_string()
}

fn default_callback_timeout_in_secs() -> u64 {
    300
}

fn default_open_browser() -> bool {
    true
}

/// Backend paths, relative to `api_base_url`.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct EndpointsConfig {
    pub google_login: String,
    pub current_user: String,
    pub logout: String,
    pub token_refresh: String,
    pub token_verify: String,
    pub users: String,
    pub chat: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        EndpointsConfig {
            google_login: "/oauth/google/".to_string(),
            current_user: "/user/".to_string(),
            logout: "/logout/".to_string(),
            token_refresh: "/token/refresh/".to_string(),
            token_verify: "/token/verify/".to_string(),
            users: "/users/".to_string(),
            chat: "/assistant/chat/".to_string(),
        }
    }
}

fn extract(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from a YAML file, with `DASHAUTH_*` environment overrides.
pub fn load_config(path: &Path) -> Result<ConfigV1, figment::Error> {
    let figment = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));
    extract(figment)
}

/// Load config from an in-memory YAML document (no environment overrides).
pub fn load_config_from_str(yaml: &str) -> Result<ConfigV1, figment::Error> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

/// The JSON schema for the configuration, pretty-printed.
pub fn schema_json() -> String {
    let schema = schema_for!(Config);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(
            r#"
version: "1.0.0"
api_base_url: "http://localhost:8000/api"
google:
  client_id: "client-123"
"#,
        )
        .expect("minimal config should parse");

        assert_eq!(config.google.scope, "openid email profile");
        assert_eq!(config.auth.flow, AuthFlow::Redirect);
        assert_eq!(config.auth.timeout_in_ms, 10_000);
        assert_eq!(config.endpoints.token_refresh, "/token/refresh/");
        assert_eq!(config.store.key, "auth_tokens");
        assert!(matches!(config.store.backend, StoreBackend::SessionFile(_)));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_full_config() {
        let config = load_config_from_str(
            r#"
version: "1.0.0"
api_base_url: "https://backend.example.com/api"
google:
  client_id: "client-123"
  scope: "openid email"
auth:
  flow: popup
  timeout_in_ms: 2500
endpoints:
  google_login: "/dj-rest-auth/google/"
store:
  type: memory
  key: "tab_tokens"
logging:
  level: debug
  format: json
"#,
        )
        .expect("full config should parse");

        assert_eq!(config.auth.flow, AuthFlow::Popup);
        assert_eq!(config.auth.timeout_in_ms, 2500);
        assert_eq!(config.endpoints.google_login, "/dj-rest-auth/google/");
        // Unspecified endpoints keep their defaults.
        assert_eq!(config.endpoints.current_user, "/user/");
        assert!(matches!(config.store.backend, StoreBackend::Memory));
        assert_eq!(config.store.key, "tab_tokens");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let result = load_config_from_str(
            r#"
version: "9.9.9"
api_base_url: "http://localhost"
google:
  client_id: "x"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_mentions_sections() {
        let schema = schema_json();
        assert!(schema.contains("api_base_url"));
        assert!(schema.contains("callback_timeout_in_secs"));
    }
}
