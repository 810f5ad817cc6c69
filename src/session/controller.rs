use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthBridge;
use crate::client::{ApiClient, Navigator};
use crate::error::SessionError;
use crate::models::{Session, SessionPhase, TokenPair, UserProfile};

/// Drives login, logout and startup restoration.
///
/// The current `Session` is published through a `watch` channel; readers
/// subscribe, and only the methods here ever write to it. Token store writes
/// that must agree with the published session happen inside the channel's
/// modify closures, so they are serialized with it.
pub struct SessionController {
    api: Arc<ApiClient>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<Session>,
    /// Bumped by every logout; a login or restore that started under an older
    /// value must not publish its result.
    generation: AtomicU64,
}

impl SessionController {
    pub fn new(api: Arc<ApiClient>, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(Session::anonymous());
        SessionController {
            api,
            navigator,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Enters `phase` unless a login or restore is already running, and
    /// returns the generation the attempt belongs to.
    fn begin(&self, phase: SessionPhase) -> Result<u64, SessionError> {
        let mut generation = None;
        self.state.send_if_modified(|session| {
            if session.is_loading() {
                return false;
            }
            generation = Some(self.generation.load(Ordering::SeqCst));
            *session = Session::pending(phase);
            true
        });
        let generation = generation.ok_or(SessionError::LoginInProgress)?;
        debug!("Session phase -> {:?}", phase);
        Ok(generation)
    }

    /// Settles an attempt started by `begin`.
    ///
    /// Success persists the pair and publishes an authenticated session;
    /// failure clears the store and publishes an anonymous one. Nothing is
    /// touched if a logout happened since the attempt began.
    fn finish(
        &self,
        generation: u64,
        outcome: Result<(TokenPair, UserProfile), SessionError>,
    ) -> Result<UserProfile, SessionError> {
        let mut result = Err(SessionError::SignedOut);
        self.state.send_if_modified(|session| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            let tokens = self.api.tokens();
            let saved = outcome.and_then(|(pair, user)| tokens.save(&pair).map(|_| (pair, user)));
            match saved {
                Ok((pair, user)) => {
                    *session = Session::authenticated(pair, user.clone());
                    result = Ok(user);
                }
                Err(e) => {
                    tokens.clear();
                    *session = Session::anonymous();
                    result = Err(e);
                }
            }
            true
        });
        if let Err(SessionError::SignedOut) = &result {
            debug!("Discarding result of an attempt that outlived a logout");
        }
        result
    }

    /// Restores a session from the stored token pair, if there is one.
    ///
    /// Ends anonymous or authenticated. A failed restore clears the stored
    /// pair; the error is returned for display only.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        if self.api.tokens().load().is_none() {
            let idle = self.state.send_if_modified(|session| {
                if session.is_loading() {
                    return false;
                }
                *session = Session::anonymous();
                true
            });
            if !idle {
                return Err(SessionError::LoginInProgress);
            }
            debug!("No stored tokens; starting anonymous");
            return Ok(());
        }

        let generation = self.begin(SessionPhase::Restoring)?;
        let outcome = match self.api.current_user().await {
            // The call may have refreshed the access token, so read the pair again.
            Ok(user) => self.api.tokens().load().map(|pair| (pair, user)).ok_or_else(|| {
                SessionError::AuthRejected("stored tokens disappeared while restoring".to_string())
            }),
            Err(e) => Err(e),
        };

        match self.finish(generation, outcome) {
            Ok(user) => {
                info!(
                    "Restored session for {}",
                    user.display_name().unwrap_or_else(|| "unknown user".to_string())
                );
                Ok(())
            }
            Err(e) if e.is_auth_failure() => {
                info!("Stored session is no longer valid: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Could not restore stored session: {}", e);
                Err(e)
            }
        }
    }

    /// Exchanges a provider token for a backend session.
    ///
    /// Rejected with `LoginInProgress` while another login or a restore is
    /// still running, and ends with `SignedOut` if `logout` is called before
    /// the exchange returns.
    pub async fn login(&self, provider_token: &str) -> Result<UserProfile, SessionError> {
        let generation = self.begin(SessionPhase::Authenticating)?;
        let outcome = self.exchange(provider_token).await;

        match self.finish(generation, outcome) {
            Ok(user) => {
                info!(
                    event_name = "session.login",
                    "Signed in as {}",
                    user.display_name().unwrap_or_else(|| "unknown user".to_string())
                );
                Ok(user)
            }
            Err(e) => {
                warn!(event_name = "session.login_failed", "Login failed: {}", e);
                Err(e)
            }
        }
    }

    async fn exchange(&self, provider_token: &str) -> Result<(TokenPair, UserProfile), SessionError> {
        self.api.google_login(provider_token).await?.into_parts()
    }

    /// Gets a provider token from `bridge`, then logs in with it.
    pub async fn login_with(&self, bridge: &dyn AuthBridge) -> Result<UserProfile, SessionError> {
        if self.session().is_loading() {
            return Err(SessionError::LoginInProgress);
        }
        debug!("Obtaining provider token via {} bridge", bridge.get_name());
        let provider_token = bridge.obtain_provider_token().await?;
        self.login(&provider_token).await
    }

    /// Ends the session locally, right away, from any state.
    ///
    /// A login or restore still in flight is abandoned. The backend is told in
    /// the background with the token held at call time; the returned handle
    /// lets a short-lived caller wait for that to finish.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let mut access_token = None;
        self.state.send_modify(|session| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            let tokens = self.api.tokens();
            access_token = tokens.access_token();
            tokens.clear();
            *session = Session::anonymous();
        });

        let notification = match (access_token, Handle::try_current()) {
            (Some(token), Ok(runtime)) => {
                let api = self.api.clone();
                Some(runtime.spawn(async move {
                    if let Err(e) = api.notify_logout(Some(token)).await {
                        warn!("Backend logout notification failed: {}", e);
                    }
                }))
            }
            (Some(_), Err(_)) => {
                warn!("No async runtime available; skipping backend logout notification");
                None
            }
            (None, _) => None,
        };

        info!(event_name = "session.logout", "Signed out");
        self.navigator.redirect_to_login();
        notification
    }
}
