//! Routes served by the loopback listener during a redirect sign-in.

mod callback;
mod health_routes;

use crate::state::CallbackState;
use axum::Router;

/// Creates the callback listener's router.
///
/// Combines the callback and health routes and attaches the state that
/// carries the redirect back to the waiting bridge.
pub fn create_router(state: CallbackState) -> Router {
    Router::new()
        .merge(callback::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
