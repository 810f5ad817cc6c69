use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::navigator::Navigator;
use crate::config::{ConfigV1, EndpointsConfig};
use crate::error::SessionError;
use crate::models::token::{mask_token, RefreshResponse};
use crate::store::TokenStore;

/// One outbound call. Built with the small constructors below and handed to
/// `ApiClient::send`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Explicit bearer; wins over the stored access token.
    pub bearer: Option<String>,
    /// Attach the stored access token when no explicit bearer is given.
    pub attach_token: bool,
    /// Whether a 401 may trigger the refresh cycle at all.
    pub refresh_on_unauthorized: bool,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            body: None,
            bearer: None,
            attach_token: true,
            refresh_on_unauthorized: true,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Public endpoint: no token, no refresh.
    pub fn anonymous(mut self) -> Self {
        self.attach_token = false;
        self.refresh_on_unauthorized = false;
        self
    }

    /// A 401 is final for this request.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    fn replay_with(&self, access_token: String) -> Self {
        let mut replay = self.clone();
        replay.bearer = Some(access_token);
        replay.retried = true;
        replay
    }
}

/// A successful backend reply. Empty bodies come back as `Value::Null`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(self) -> Result<T, SessionError> {
        serde_json::from_value(self.body).map_err(|e| SessionError::InvalidResponse(e.to_string()))
    }
}

/// HTTP client for the protected backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    endpoints: EndpointsConfig,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        config: &ConfigV1,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.auth.timeout_in_ms))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SessionError::NetworkFailure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ApiClient {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            tokens,
            navigator,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a request, refreshing the access token once on 401.
    ///
    /// A request that is already a replay never refreshes again; its 401 comes
    /// back as `TokenExpired`. A failed refresh clears the stored pair, sends
    /// the user to login and comes back as `AuthRejected`.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let response = self.dispatch(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !request.refresh_on_unauthorized {
            return Self::into_api_response(response).await;
        }

        if request.retried {
            warn!(
                "{} {} still unauthorized after token refresh",
                request.method, request.path
            );
            return Err(SessionError::TokenExpired);
        }

        debug!(
            "{} {} returned 401; attempting token refresh",
            request.method, request.path
        );
        let access_token = self.refresh_session().await?;

        let replay = request.replay_with(access_token);
        let response = self.dispatch(&replay).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(
                "{} {} still unauthorized after token refresh",
                replay.method, replay.path
            );
            return Err(SessionError::TokenExpired);
        }
        Self::into_api_response(response).await
    }

    /// Mints a new access token from the stored refresh token and persists it.
    pub async fn refresh_session(&self) -> Result<String, SessionError> {
        let Some(pair) = self.tokens.load() else {
            return Err(SessionError::AuthRejected(
                "not signed in: no refresh token available".to_string(),
            ));
        };

        let refreshed = match self.request_refresh(&pair.refresh_token).await {
            Ok(access_token) => self.tokens.update_access_token(&access_token),
            Err(e) => Err(e),
        };

        match refreshed {
            Ok(updated) => {
                info!(
                    "Access token refreshed ({})",
                    mask_token(&updated.access_token)
                );
                Ok(updated.access_token)
            }
            Err(e) => {
                warn!("Token refresh failed, ending session: {}", e);
                self.tokens.clear();
                self.navigator.redirect_to_login();
                Err(SessionError::AuthRejected(format!(
                    "session expired and could not be refreshed: {}",
                    e
                )))
            }
        }
    }

    // The refresh endpoint is called directly, outside the token-injection path.
    async fn request_refresh(&self, refresh_token: &str) -> Result<String, SessionError> {
        let response = self
            .http
            .post(self.url(&self.endpoints.token_refresh))
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::from_status(status, &body));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| SessionError::InvalidResponse(format!("refresh response: {}", e)))?;
        if refreshed.access.trim().is_empty() {
            return Err(SessionError::InvalidResponse(
                "refresh response carried an empty access token".to_string(),
            ));
        }
        Ok(refreshed.access)
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<reqwest::Response, SessionError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));

        let token = match &request.bearer {
            Some(token) => Some(token.clone()),
            None if request.attach_token => self.tokens.access_token(),
            None => None,
        };
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            "{} {} (retry={})",
            request.method, request.path, request.retried
        );
        Ok(builder.send().await?)
    }

    async fn into_api_response(response: reqwest::Response) -> Result<ApiResponse, SessionError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SessionError::from_status(status, &text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::models::TokenPair;
    use crate::store::memory_store::MemoryStorage;
    use mockito::{Matcher, Server};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNavigator {
        redirects: AtomicUsize,
    }

    impl Navigator for CountingNavigator {
        fn redirect_to_login(&self) {
            self.redirects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn create_test_client(url: &str) -> (ApiClient, Arc<TokenStore>, Arc<CountingNavigator>) {
        let config = load_config_from_str(&format!(
            r#"
version: "1.0.0"
api_base_url: "{url}"
google:
  client_id: "test-client"
auth:
  timeout_in_ms: 2000
store:
  type: memory
"#
        ))
        .expect("test config should parse");

        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new()), "auth_tokens"));
        let navigator = Arc::new(CountingNavigator::default());
        let client = ApiClient::new(&config, tokens.clone(), navigator.clone()).unwrap();
        (client, tokens, navigator)
    }

    #[test]
    fn test_url_joining() {
        let (client, _, _) = create_test_client("http://backend.local/api/");
        assert_eq!(client.url("/user/"), "http://backend.local/api/user/");
        assert_eq!(client.url("user/"), "http://backend.local/api/user/");
        assert_eq!(client.url("https://other/x"), "https://other/x");
    }

    #[tokio::test]
    async fn test_stored_token_is_injected() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/user/")
            .match_header("authorization", "Bearer A1")
            .with_status(200)
            .with_body(r#"{"pk": 1}"#)
            .create_async()
            .await;

        let (client, tokens, _) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        let response = client.send(ApiRequest::get("/user/")).await.unwrap();
        m.assert_async().await;
        assert_eq!(response.body["pk"], 1);
    }

    #[tokio::test]
    async fn test_no_token_sends_unauthenticated() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/public/")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let (client, _, _) = create_test_client(&server.url());
        let response = client.send(ApiRequest::get("/public/")).await.unwrap();
        m.assert_async().await;
        assert_eq!(response.body, Value::Null);
    }

    #[tokio::test]
    async fn test_anonymous_request_skips_stored_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/assistant/chat/")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"reply": "hi"}"#)
            .create_async()
            .await;

        let (client, tokens, _) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        client
            .send(ApiRequest::post("/assistant/chat/").anonymous())
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_replays() {
        let mut server = Server::new_async().await;
        let stale = server
            .mock("GET", "/user/")
            .match_header("authorization", "Bearer A1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token/refresh/")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({"refresh": "R1"})))
            .with_status(200)
            .with_body(r#"{"access": "A2"}"#)
            .expect(1)
            .create_async()
            .await;
        let fresh = server
            .mock("GET", "/user/")
            .match_header("authorization", "Bearer A2")
            .with_status(200)
            .with_body(r#"{"pk": 9}"#)
            .expect(1)
            .create_async()
            .await;

        let (client, tokens, navigator) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        let response = client.send(ApiRequest::get("/user/")).await.unwrap();

        stale.assert_async().await;
        refresh.assert_async().await;
        fresh.assert_async().await;
        assert_eq!(response.body["pk"], 9);
        assert_eq!(tokens.load(), Some(TokenPair::new("A2", "R1")));
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_401_is_surfaced_not_retried() {
        let mut server = Server::new_async().await;
        let unauthorized = server
            .mock("GET", "/user/")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token/refresh/")
            .with_status(200)
            .with_body(r#"{"access": "A2"}"#)
            .expect(1)
            .create_async()
            .await;

        let (client, tokens, _) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        let result = client.send(ApiRequest::get("/user/")).await;

        unauthorized.assert_async().await;
        refresh.assert_async().await;
        assert_eq!(result.unwrap_err(), SessionError::TokenExpired);
    }

    #[tokio::test]
    async fn test_request_marked_retried_never_refreshes() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user/")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let (client, tokens, _) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        let mut request = ApiRequest::get("/user/");
        request.retried = true;
        let result = client.send(request).await;

        refresh.assert_async().await;
        assert_eq!(result.unwrap_err(), SessionError::TokenExpired);
        assert!(tokens.load().is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_tokens_and_navigates() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user/")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/token/refresh/")
            .with_status(401)
            .with_body(r#"{"detail": "Token is blacklisted"}"#)
            .create_async()
            .await;

        let (client, tokens, navigator) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        let result = client.send(ApiRequest::get("/user/")).await;

        assert!(matches!(result, Err(SessionError::AuthRejected(_))));
        assert_eq!(tokens.load(), None);
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_401_without_stored_pair_has_no_side_effects() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user/")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let (client, _, navigator) = create_test_client(&server.url());
        let result = client.send(ApiRequest::get("/user/")).await;

        refresh.assert_async().await;
        assert!(matches!(result, Err(SessionError::AuthRejected(_))));
        assert_eq!(navigator.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_without_refresh_maps_401_to_auth_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/oauth/google/")
            .with_status(401)
            .with_body(r#"{"detail": "bad provider token"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let (client, tokens, _) = create_test_client(&server.url());
        tokens.save(&TokenPair::new("A1", "R1")).unwrap();

        let result = client
            .send(ApiRequest::post("/oauth/google/").without_refresh())
            .await;

        refresh.assert_async().await;
        assert_eq!(
            result.unwrap_err(),
            SessionError::AuthRejected("bad provider token".to_string())
        );
    }

    #[tokio::test]
    async fn test_server_error_is_reported_with_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user/")
            .with_status(503)
            .with_body(r#"{"detail": "maintenance"}"#)
            .create_async()
            .await;

        let (client, _, _) = create_test_client(&server.url());
        let result = client.send(ApiRequest::get("/user/")).await;
        assert_eq!(
            result.unwrap_err(),
            SessionError::Http {
                status: 503,
                message: "maintenance".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_failure() {
        let (client, _, _) = create_test_client("http://127.0.0.1:1");
        let result = client.send(ApiRequest::get("/user/")).await;
        assert!(matches!(result, Err(SessionError::NetworkFailure(_))));
    }
}
