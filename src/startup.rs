//! Wiring: builds the token store, API client, session controller and auth
//! bridge from configuration, then runs a command against them.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::debug;

use crate::auth::{create_auth_bridge, AuthBridge};
use crate::cli::{self, Command};
use crate::client::{ApiClient, LoginPrompt, Navigator};
use crate::config::ConfigV1;
use crate::error::SessionError;
use crate::session::SessionController;
use crate::store::{create_storage, TokenStore};

/// Everything a command needs, built once per process.
pub struct App {
    /// Configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Backend client; owns the token store.
    pub api: Arc<ApiClient>,
    /// Owner of the session state.
    pub controller: SessionController,
    /// Sign-in flow selected by `auth.flow`.
    pub bridge: Box<dyn AuthBridge>,
}

/// Builds the app around the given navigator.
///
/// # Errors
///
/// Returns an error if the storage backend cannot be opened or the HTTP
/// client cannot be built.
pub fn build_app(config: Arc<ConfigV1>, navigator: Arc<dyn Navigator>) -> Result<App, SessionError> {
    let storage = create_storage(&config.store).map_err(SessionError::Storage)?;
    debug!(
        "Token store '{}' keyed by '{}'",
        storage.get_name(),
        config.store.key
    );
    let tokens = Arc::new(TokenStore::new(storage, config.store.key.clone()));
    let api = Arc::new(ApiClient::new(&config, tokens, navigator.clone())?);
    let controller = SessionController::new(api.clone(), navigator);
    let bridge = create_auth_bridge(&config);
    debug!("Sign-in will use the {} bridge", bridge.get_name());

    Ok(App {
        config,
        api,
        controller,
        bridge,
    })
}

/// Builds the app with the terminal navigator and runs `command`.
///
/// # Errors
///
/// Returns an error if the app cannot be built or the command fails in a way
/// that is not rendered to the user.
pub async fn run(config: Arc<ConfigV1>, command: Command) -> Result<ExitCode, SessionError> {
    let navigator = Arc::new(LoginPrompt::new(concat!(env!("CARGO_PKG_NAME"), " login")));
    let app = build_app(config, navigator)?;
    cli::execute(&app, command).await
}
