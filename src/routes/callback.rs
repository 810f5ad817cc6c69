//! The redirect target the provider sends the browser back to.

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{debug, info};
use url::Url;

use crate::auth::redirect::CALLBACK_PATH;
use crate::state::CallbackState;
use crate::utils::http_helpers::{callback_page, HTTPError};

/// Registers the callback route.
pub fn routes() -> Router<CallbackState> {
    Router::new().route(CALLBACK_PATH, get(receive_callback))
}

/// GET /callback: hands the full redirect URL to the waiting bridge.
///
/// Only the first callback is accepted; later ones get 409, and a callback
/// arriving after the bridge gave up gets 410.
async fn receive_callback(
    State(state): State<CallbackState>,
    OriginalUri(uri): OriginalUri,
) -> Result<impl IntoResponse, HTTPError> {
    let url = Url::parse(&format!("{}{}", state.origin, uri)).map_err(|e| {
        HTTPError::new(StatusCode::BAD_REQUEST, format!("Malformed callback URL: {}", e))
    })?;

    let Some(sender) = state.take_sender() else {
        debug!("Ignoring repeated callback");
        return Err(HTTPError::new(
            StatusCode::CONFLICT,
            "This sign-in has already been completed",
        ));
    };

    let failed = url.query_pairs().any(|(key, _)| key == "error");
    if sender.send(url).is_err() {
        return Err(HTTPError::new(
            StatusCode::GONE,
            "Sign-in is no longer waiting for this callback",
        ));
    }
    info!("Received sign-in redirect");

    Ok(if failed {
        callback_page(
            "Sign-in failed",
            "Return to the terminal for details.",
        )
    } else {
        callback_page(
            "Signed in",
            "You can close this window and return to the terminal.",
        )
    })
}
