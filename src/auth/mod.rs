//! Ways of obtaining a provider (Google) access token.
//!
//! Every bridge hands back the token as a plain string; what the backend does
//! with it is the session controller's business.

pub mod bridge;
pub mod popup;
pub mod redirect;

pub use bridge::{create_auth_bridge, AuthBridge};
pub use popup::{PastedTokenClient, PopupBridge, TokenClient, TokenClientResponse};
pub use redirect::{CallbackOutcome, RedirectBridge, RedirectFlow};
