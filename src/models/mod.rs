pub mod session;
pub mod token;
pub mod user;

// Re-export the model types so callers can "use crate::models::{Session, TokenPair}".
pub use session::{Session, SessionPhase};
pub use token::{LoginResponse, RefreshResponse, TokenPair};
pub use user::UserProfile;
