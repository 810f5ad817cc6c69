//! Response helpers for the callback listener.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;

/// Error reply for the local callback listener.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message }).to_string();
        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

/// The page shown in the browser once the redirect has been captured.
pub fn callback_page(title: &str, detail: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><h2>{title}</h2><p>{detail}</p></body></html>"
    ))
}
