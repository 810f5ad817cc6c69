//! Health check endpoint for the callback listener.

use crate::state::CallbackState;
use axum::{
    body::Body,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

/// Registers health check routes.
pub fn routes() -> Router<CallbackState> {
    Router::new().route("/health", get(health_check))
}

/// Simple health check endpoint.
///
/// Returns a 200 OK status while the listener is waiting for a redirect.
async fn health_check() -> impl IntoResponse {
    Response::new(Body::from("OK"))
}
