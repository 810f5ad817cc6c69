use std::sync::Arc;

use super::popup::{PastedTokenClient, PopupBridge};
use super::redirect::RedirectBridge;
use crate::config::{AuthFlow, ConfigV1};
use crate::error::SessionError;

/// Something that can get the user through the provider's sign-in and return
/// the resulting access token.
#[async_trait::async_trait]
pub trait AuthBridge: Send + Sync {
    fn get_name(&self) -> &str;
    async fn obtain_provider_token(&self) -> Result<String, SessionError>;
}

/// Create the bridge selected by `auth.flow`.
pub fn create_auth_bridge(config: &ConfigV1) -> Box<dyn AuthBridge> {
    match config.auth.flow {
        AuthFlow::Redirect => Box::new(RedirectBridge::new(config)),
        AuthFlow::Popup => Box::new(PopupBridge::new(
            Arc::new(PastedTokenClient::new(config)),
            config,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_flow_selects_bridge() {
        let redirect = load_config_from_str(
            r#"
version: "1.0.0"
api_base_url: "http://localhost:8000"
google:
  client_id: "test-client"
"#,
        )
        .unwrap();
        assert_eq!(create_auth_bridge(&redirect).get_name(), "redirect");

        let popup = load_config_from_str(
            r#"
version: "1.0.0"
api_base_url: "http://localhost:8000"
google:
  client_id: "test-client"
auth:
  flow: popup
"#,
        )
        .unwrap();
        assert_eq!(create_auth_bridge(&popup).get_name(), "popup");
    }
}
