#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashauth::client::Navigator;
use dashauth::config::{load_config_from_str, ConfigV1};
use dashauth::startup::{build_app, App};

/// Counts how often the app asked to go back to the login screen.
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: AtomicUsize,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config(api_base_url: &str) -> ConfigV1 {
    load_config_from_str(&format!(
        r#"
version: "1.0.0"
api_base_url: "{api_base_url}"
google:
  client_id: "test-client.apps.googleusercontent.com"
auth:
  timeout_in_ms: 2000
  open_browser: false
  callback_timeout_in_secs: 2
store:
  type: memory
"#
    ))
    .expect("test config should parse")
}

pub fn build_test_app(api_base_url: &str) -> (App, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let app = build_app(Arc::new(test_config(api_base_url)), navigator.clone())
        .expect("test app should build");
    (app, navigator)
}

pub fn user_body() -> &'static str {
    r#"{"pk": 7, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}"#
}

pub fn login_body(access: &str, refresh: &str) -> String {
    format!(
        r#"{{"access_token": "{access}", "refresh_token": "{refresh}", "user": {}}}"#,
        user_body()
    )
}
