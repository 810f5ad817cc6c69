use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use super::bridge::AuthBridge;
use super::redirect::{take_callback_params, CallbackOutcome};
use crate::config::ConfigV1;
use crate::error::SessionError;

/// What a provider token client hands to its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenClientResponse {
    Granted { access_token: Option<String> },
    Failed { error: String },
}

pub type TokenCallback = Box<dyn FnOnce(TokenClientResponse) + Send + 'static>;

/// A callback-style provider client: asks for a token and calls back once.
pub trait TokenClient: Send + Sync {
    fn request_access_token(&self, scope: &str, callback: TokenCallback);
}

/// Turns a callback-style token client into a single awaited result.
pub struct PopupBridge {
    client: Arc<dyn TokenClient>,
    scope: String,
    wait: Duration,
}

impl PopupBridge {
    pub fn new(client: Arc<dyn TokenClient>, config: &ConfigV1) -> Self {
        PopupBridge {
            client,
            scope: config.google.scope.clone(),
            wait: Duration::from_secs(config.auth.callback_timeout_in_secs),
        }
    }
}

#[async_trait::async_trait]
impl AuthBridge for PopupBridge {
    fn get_name(&self) -> &str {
        "popup"
    }

    async fn obtain_provider_token(&self) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.client.request_access_token(
            &self.scope,
            Box::new(move |response| {
                // The receiver is gone if the wait already timed out.
                let _ = tx.send(response);
            }),
        );

        let response = match tokio::time::timeout(self.wait, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(SessionError::Provider(
                    "Google OAuth failed: the sign-in was abandoned".to_string(),
                ))
            }
            Err(_) => {
                return Err(SessionError::Provider(format!(
                    "Timed out after {}s waiting for Google sign-in",
                    self.wait.as_secs()
                )))
            }
        };

        match response {
            TokenClientResponse::Granted {
                access_token: Some(token),
            } if !token.trim().is_empty() => {
                debug!("Provider token received");
                Ok(token)
            }
            TokenClientResponse::Granted { .. } => Err(SessionError::Provider(
                "Google OAuth failed: No access token received".to_string(),
            )),
            TokenClientResponse::Failed { error } => {
                warn!("Provider sign-in failed: {}", error);
                Err(SessionError::Provider(format!(
                    "Google OAuth error: {}",
                    error
                )))
            }
        }
    }
}

/// Where the pasted reply is read from. Called on the reading thread.
pub type InputSource = fn() -> Box<dyn BufRead>;

fn stdin_input() -> Box<dyn BufRead> {
    Box::new(std::io::stdin().lock())
}

/// Terminal token client: the user completes sign-in in a browser and pastes
/// the access token, or the URL it was delivered on.
///
/// The read happens on a detached thread so an abandoned prompt never holds
/// up runtime shutdown.
pub struct PastedTokenClient {
    client_id: String,
    input: InputSource,
}

impl PastedTokenClient {
    pub fn new(config: &ConfigV1) -> Self {
        Self::with_input(config, stdin_input)
    }

    pub fn with_input(config: &ConfigV1, input: InputSource) -> Self {
        PastedTokenClient {
            client_id: config.google.client_id.clone(),
            input,
        }
    }
}

fn read_reply(mut reader: Box<dyn BufRead>) -> TokenClientResponse {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => TokenClientResponse::Failed {
            error: "no input".to_string(),
        },
        Ok(_) => match parse_pasted_token(&line) {
            CallbackOutcome::Token(token) => TokenClientResponse::Granted {
                access_token: Some(token),
            },
            CallbackOutcome::Error(error) => TokenClientResponse::Failed { error },
            CallbackOutcome::Empty => TokenClientResponse::Granted { access_token: None },
        },
        Err(e) => TokenClientResponse::Failed {
            error: e.to_string(),
        },
    }
}

impl TokenClient for PastedTokenClient {
    fn request_access_token(&self, scope: &str, callback: TokenCallback) {
        eprintln!(
            "Sign in with Google (client {}, scope \"{}\") and paste the access token or the URL you were sent to.",
            self.client_id, scope
        );
        let input = self.input;
        let spawned = std::thread::Builder::new()
            .name("token-prompt".to_string())
            .spawn(move || {
                eprint!("> ");
                callback(read_reply(input()));
            });
        // On failure the callback is dropped with the closure, which the bridge
        // reports as an abandoned sign-in.
        if let Err(e) = spawned {
            warn!("Could not start the token prompt: {}", e);
        }
    }
}

/// Accepts a bare token, an `access_token=...` pair, or a URL carrying one in
/// its query or fragment.
pub fn parse_pasted_token(input: &str) -> CallbackOutcome {
    let input = input.trim();
    if input.is_empty() {
        return CallbackOutcome::Empty;
    }
    if let Ok(url) = Url::parse(input) {
        if url.has_host() {
            return take_callback_params(&url).0.outcome;
        }
    }
    if input.contains("access_token=") || input.contains("error=") {
        let as_url = format!("http://localhost/?{}", input.trim_start_matches(['?', '#']));
        if let Ok(url) = Url::parse(&as_url) {
            return take_callback_params(&url).0.outcome;
        }
    }
    CallbackOutcome::Token(input.to_string())
}
