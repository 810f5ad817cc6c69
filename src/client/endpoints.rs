use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::api_client::{ApiClient, ApiRequest};
use crate::error::SessionError;
use crate::models::{LoginResponse, UserProfile};

/// Reply from the public chat assistant endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChatReply {
    #[serde(default, alias = "response", alias = "message")]
    pub reply: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl ApiClient {
    /// Exchanges a provider token for backend tokens plus the user record.
    /// A 401 here means the provider token was refused, so no refresh is tried.
    pub async fn google_login(&self, provider_token: &str) -> Result<LoginResponse, SessionError> {
        let request = ApiRequest::post(self.endpoints().google_login.as_str())
            .with_json(json!({ "access_token": provider_token }))
            .without_refresh();
        self.send(request).await?.json()
    }

    /// "Who am I" for the current access token.
    pub async fn current_user(&self) -> Result<UserProfile, SessionError> {
        let response = self
            .send(ApiRequest::get(self.endpoints().current_user.as_str()))
            .await?;
        match response.body {
            Value::Object(_) => Ok(UserProfile::new(response.body)),
            other => Err(SessionError::InvalidResponse(format!(
                "expected a user object, got {}",
                other
            ))),
        }
    }

    /// Tells the backend the session is over. Uses the token captured by the
    /// caller because the store may already be empty by the time this runs.
    pub async fn notify_logout(&self, access_token: Option<String>) -> Result<(), SessionError> {
        let mut request = ApiRequest::post(self.endpoints().logout.as_str()).anonymous();
        if let Some(token) = access_token {
            request = request.with_bearer(token);
        }
        self.send(request).await?;
        debug!("Backend acknowledged logout");
        Ok(())
    }

    /// Asks the backend whether a token is still valid.
    pub async fn verify_token(&self, token: &str) -> Result<bool, SessionError> {
        let request = ApiRequest::post(self.endpoints().token_verify.as_str())
            .with_json(json!({ "token": token }))
            .anonymous();
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(SessionError::AuthRejected(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_user(&self, id: u64) -> Result<UserProfile, SessionError> {
        let path = format!("{}{}/", self.endpoints().users, id);
        let response = self.send(ApiRequest::get(path)).await?;
        Ok(UserProfile::new(response.body))
    }

    pub async fn create_user(&self, user_data: Value) -> Result<UserProfile, SessionError> {
        let request = ApiRequest::post(self.endpoints().users.as_str()).with_json(user_data);
        let response = self.send(request).await?;
        Ok(UserProfile::new(response.body))
    }

    /// Public endpoint; sent without credentials.
    pub async fn chat(&self, message: &str, thread_id: Option<&str>) -> Result<ChatReply, SessionError> {
        let request = ApiRequest::post(self.endpoints().chat.as_str())
            .with_json(json!({ "message": message, "thread_id": thread_id }))
            .anonymous();
        self.send(request).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::navigator::Navigator;
    use crate::config::load_config_from_str;
    use crate::models::TokenPair;
    use crate::store::memory_store::MemoryStorage;
    use crate::store::TokenStore;
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    struct QuietNavigator;

    impl Navigator for QuietNavigator {
        fn redirect_to_login(&self) {}
    }

    fn create_test_client(url: &str) -> ApiClient {
        let config = load_config_from_str(&format!(
            r#"
version: "1.0.0"
api_base_url: "{url}"
google:
  client_id: "test-client"
store:
  type: memory
"#
        ))
        .unwrap();
        let tokens = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new()), "auth_tokens"));
        ApiClient::new(&config, tokens, Arc::new(QuietNavigator)).unwrap()
    }

    #[tokio::test]
    async fn test_google_login_posts_provider_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/oauth/google/")
            .match_body(Matcher::Json(json!({"access_token": "provider-token"})))
            .with_status(200)
            .with_body(
                r#"{"access_token": "A1", "refresh_token": "R1", "user": {"pk": 3, "email": "x@example.com"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = client.google_login("provider-token").await.unwrap();
        m.assert_async().await;

        let (pair, user) = response.into_parts().unwrap();
        assert_eq!(pair, TokenPair::new("A1", "R1"));
        assert_eq!(user.id().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_current_user_rejects_non_object() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/user/")
            .with_status(200)
            .with_body(r#"["not", "a", "user"]"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        assert!(matches!(
            client.current_user().await,
            Err(SessionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_notify_logout_uses_captured_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/logout/")
            .match_header("authorization", "Bearer A1")
            .with_status(200)
            .with_body(r#"{"detail": "Successfully logged out."}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        // Nothing is stored: the captured token is what gets sent.
        client.notify_logout(Some("A1".to_string())).await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_token() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token/verify/")
            .match_body(Matcher::Json(json!({"token": "good"})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("POST", "/token/verify/")
            .match_body(Matcher::Json(json!({"token": "bad"})))
            .with_status(401)
            .with_body(r#"{"detail": "Token is invalid or expired"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        assert!(client.verify_token("good").await.unwrap());
        assert!(!client.verify_token("bad").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_user_builds_path() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/users/12/")
            .with_status(200)
            .with_body(r#"{"pk": 12}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let user = client.get_user(12).await.unwrap();
        m.assert_async().await;
        assert_eq!(user.id().as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_chat_is_public() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/assistant/chat/")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({"message": "hello", "thread_id": null})))
            .with_status(200)
            .with_body(r#"{"response": "Hi there", "thread_id": "t-1"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let reply = client.chat("hello", None).await.unwrap();
        m.assert_async().await;
        assert_eq!(reply.reply, "Hi there");
        assert_eq!(reply.thread_id.as_deref(), Some("t-1"));
    }
}
