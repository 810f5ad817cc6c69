//! Outbound calls to the REST backend.
//!
//! `ApiClient` injects the stored access token and performs the single
//! refresh-then-retry cycle; `endpoints` holds the typed calls on top of it.

pub mod api_client;
pub mod endpoints;
pub mod navigator;

pub use api_client::{ApiClient, ApiRequest, ApiResponse};
pub use endpoints::ChatReply;
pub use navigator::{LoginPrompt, Navigator};
