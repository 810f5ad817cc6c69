use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::form_urlencoded;
use url::Url;
use uuid::Uuid;

use super::bridge::AuthBridge;
use crate::config::ConfigV1;
use crate::error::SessionError;
use crate::routes;
use crate::state::CallbackState;

/// Path the provider redirects back to on the loopback listener.
pub const CALLBACK_PATH: &str = "/callback";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What the provider put on the redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Token(String),
    Error(String),
    /// Neither a token nor an error was present.
    Empty,
}

impl CallbackOutcome {
    pub fn into_token(self) -> Result<String, SessionError> {
        match self {
            CallbackOutcome::Token(token) => Ok(token),
            CallbackOutcome::Error(error) => Err(SessionError::Provider(format!(
                "Google OAuth error: {}",
                error
            ))),
            CallbackOutcome::Empty => Err(SessionError::Provider(
                "Google OAuth failed: No access token received".to_string(),
            )),
        }
    }
}

/// Parameters pulled off a callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub outcome: CallbackOutcome,
    pub state: Option<String>,
}

#[derive(Debug)]
enum RedirectPhase {
    Idle,
    AwaitingRedirect { state: String, login_url: Url },
}

/// The two halves of a full-page redirect sign-in.
///
/// `initiate` remembers that a redirect is expected and returns where to send
/// the user. `resume` consumes the parameters of the redirect that comes back,
/// exactly once, and returns the URL with those parameters removed.
pub struct RedirectFlow {
    login_url: String,
    client_id: String,
    scope: String,
    phase: Mutex<RedirectPhase>,
}

impl RedirectFlow {
    pub fn new(config: &ConfigV1) -> Self {
        RedirectFlow {
            login_url: format!(
                "{}{}",
                config.api_base_url.trim_end_matches('/'),
                config.google.login_path
            ),
            client_id: config.google.client_id.clone(),
            scope: config.google.scope.clone(),
            phase: Mutex::new(RedirectPhase::Idle),
        }
    }

    pub fn initiate(&self, redirect_uri: &str) -> Result<Url, SessionError> {
        let state = Uuid::new_v4().simple().to_string();
        let url = Url::parse_with_params(
            &self.login_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", self.scope.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| {
            SessionError::Provider(format!("Invalid login URL '{}': {}", self.login_url, e))
        })?;

        let mut phase = self.lock_phase()?;
        if let RedirectPhase::AwaitingRedirect { .. } = *phase {
            debug!("Discarding an unfinished sign-in attempt");
        }
        *phase = RedirectPhase::AwaitingRedirect {
            state,
            login_url: url.clone(),
        };
        Ok(url)
    }

    pub fn resume(&self, callback_url: &Url) -> Result<(CallbackOutcome, Url), SessionError> {
        let expected = {
            let mut phase = self.lock_phase()?;
            match std::mem::replace(&mut *phase, RedirectPhase::Idle) {
                RedirectPhase::AwaitingRedirect { state, .. } => state,
                RedirectPhase::Idle => {
                    return Err(SessionError::Provider(
                        "No sign-in is waiting for a redirect".to_string(),
                    ))
                }
            }
        };

        let (params, cleaned) = take_callback_params(callback_url);
        if let Some(returned) = &params.state {
            if *returned != expected {
                warn!("Redirect state did not match the sign-in that was started");
                return Err(SessionError::Provider(
                    "Redirect state does not match this sign-in".to_string(),
                ));
            }
        }
        Ok((params.outcome, cleaned))
    }

    pub fn cancel(&self) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = RedirectPhase::Idle;
        }
    }

    pub fn is_awaiting_redirect(&self) -> bool {
        self.pending_login_url().is_some()
    }

    /// The login URL of the attempt in progress, if any.
    pub fn pending_login_url(&self) -> Option<Url> {
        match &*self.phase.lock().ok()? {
            RedirectPhase::AwaitingRedirect { login_url, .. } => Some(login_url.clone()),
            RedirectPhase::Idle => None,
        }
    }

    fn lock_phase(&self) -> Result<MutexGuard<'_, RedirectPhase>, SessionError> {
        self.phase
            .lock()
            .map_err(|_| SessionError::Provider("redirect flow mutex poisoned".to_string()))
    }
}

#[derive(Default)]
struct Found {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    state: Option<String>,
}

impl Found {
    fn any(&self) -> bool {
        self.access_token.is_some() || self.error.is_some()
    }
}

/// Splits the sign-in parameters off `url`, looking at the query and, for
/// implicit-grant style redirects, the fragment.
pub fn take_callback_params(url: &Url) -> (CallbackParams, Url) {
    let mut found = Found::default();
    let mut cleaned = url.clone();

    if let Some(query) = url.query() {
        let kept = split_params(query, &mut found);
        cleaned.set_query(kept.as_deref());
    }
    if let Some(fragment) = url.fragment() {
        let mut in_fragment = Found::default();
        let kept = split_params(fragment, &mut in_fragment);
        if in_fragment.any() {
            cleaned.set_fragment(kept.as_deref());
            found.access_token = found.access_token.or(in_fragment.access_token);
            found.error = found.error.or(in_fragment.error);
            found.error_description = found.error_description.or(in_fragment.error_description);
            found.state = found.state.or(in_fragment.state);
        }
    }

    let outcome = match (found.error, found.access_token) {
        (Some(error), _) if !error.is_empty() => match found.error_description {
            Some(description) if !description.is_empty() => {
                CallbackOutcome::Error(format!("{}: {}", error, description))
            }
            _ => CallbackOutcome::Error(error),
        },
        (_, Some(token)) if !token.trim().is_empty() => CallbackOutcome::Token(token),
        _ => CallbackOutcome::Empty,
    };

    (
        CallbackParams {
            outcome,
            state: found.state,
        },
        cleaned,
    )
}

fn split_params(encoded: &str, found: &mut Found) -> Option<String> {
    let mut kept = form_urlencoded::Serializer::new(String::new());
    let mut kept_any = false;
    for (key, value) in form_urlencoded::parse(encoded.as_bytes()) {
        let slot = match key.as_ref() {
            "access_token" => &mut found.access_token,
            "error" => &mut found.error,
            "error_description" => &mut found.error_description,
            "state" => &mut found.state,
            _ => {
                kept.append_pair(&key, &value);
                kept_any = true;
                continue;
            }
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }
    kept_any.then(|| kept.finish())
}

/// Full-page redirect sign-in, with a loopback listener standing in for the
/// page the provider returns to.
pub struct RedirectBridge {
    flow: Arc<RedirectFlow>,
    bind_address: String,
    wait: Duration,
    open_browser: bool,
}

impl RedirectBridge {
    pub fn new(config: &ConfigV1) -> Self {
        RedirectBridge {
            flow: Arc::new(RedirectFlow::new(config)),
            bind_address: config.auth.callback_bind_address.clone(),
            wait: Duration::from_secs(config.auth.callback_timeout_in_secs),
            open_browser: config.auth.open_browser,
        }
    }

    pub fn flow(&self) -> &RedirectFlow {
        &self.flow
    }
}

fn present_login_url(url: &Url, open_browser: bool) {
    eprintln!("Sign in with Google to continue:\n\n    {}\n", url);
    if open_browser {
        if let Err(e) = open::that_detached(url.as_str()) {
            warn!("Could not open a browser: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl AuthBridge for RedirectBridge {
    fn get_name(&self) -> &str {
        "redirect"
    }

    async fn obtain_provider_token(&self) -> Result<String, SessionError> {
        let listener = TcpListener::bind(&self.bind_address).await.map_err(|e| {
            SessionError::Provider(format!(
                "Could not bind callback listener on {}: {}",
                self.bind_address, e
            ))
        })?;
        let addr = listener.local_addr().map_err(|e| {
            SessionError::Provider(format!("Callback listener has no local address: {}", e))
        })?;
        let redirect_uri = format!("http://{}{}", addr, CALLBACK_PATH);
        let login_url = self.flow.initiate(&redirect_uri)?;

        let (url_tx, url_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = routes::create_router(CallbackState::new(addr, url_tx));
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Waiting for the sign-in redirect on {}", redirect_uri);
        present_login_url(&login_url, self.open_browser);

        let received = tokio::time::timeout(self.wait, url_rx).await;
        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Err(e))) => warn!("Callback listener stopped with an error: {}", e),
            Ok(Err(e)) => warn!("Callback listener task failed: {}", e),
            Err(_) => debug!("Callback listener still draining; leaving it to finish"),
            Ok(Ok(Ok(()))) => debug!("Callback listener stopped"),
        }

        let callback_url = match received {
            Ok(Ok(url)) => url,
            Ok(Err(_)) => {
                self.flow.cancel();
                return Err(SessionError::Provider(
                    "Callback listener closed before the redirect arrived".to_string(),
                ));
            }
            Err(_) => {
                self.flow.cancel();
                return Err(SessionError::Provider(format!(
                    "Timed out after {}s waiting for the sign-in redirect",
                    self.wait.as_secs()
                )));
            }
        };

        let (outcome, cleaned) = self.flow.resume(&callback_url)?;
        debug!("Redirect consumed, callback URL is now {}", cleaned);
        outcome.into_token()
    }
}
