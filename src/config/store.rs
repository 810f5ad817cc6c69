use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the token pair lives:
/// - key: the storage key holding the JSON record.
/// - backend: the storage backend, chosen by a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StoreConfig {
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(flatten)]
    pub backend: StoreBackend,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            key: default_key(),
            backend: StoreBackend::SessionFile(SessionFileConfig::default()),
        }
    }
}

fn default_key() -> String {
    "auth_tokens".to_string()
}

/// The existing storage backends. Both are session scoped: nothing survives
/// the end of the login session or a machine restart.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreBackend {
    /// Lives as long as the process.
    #[serde(rename = "memory")]
    Memory,
    /// Files under the per-user runtime directory.
    #[serde(rename = "session-file")]
    SessionFile(SessionFileConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct SessionFileConfig {
    /// Overrides the runtime directory; mostly useful for tests.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}
