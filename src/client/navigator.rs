use tracing::info;

/// The "send the user back to the login entry point" side effect.
///
/// Triggered when a refresh fails and on logout. The view layer decides what
/// going to login means for it.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

/// Terminal navigator: tells the user how to sign in again.
pub struct LoginPrompt {
    login_command: String,
}

impl LoginPrompt {
    pub fn new(login_command: impl Into<String>) -> Self {
        LoginPrompt {
            login_command: login_command.into(),
        }
    }
}

impl Navigator for LoginPrompt {
    fn redirect_to_login(&self) {
        info!(event_name = "navigation.login", "redirecting to login");
        eprintln!("Signed out. Run `{}` to sign in.", self.login_command);
    }
}
