use crate::models::{Session, SessionPhase, UserProfile};

const LOGIN_HINT: &str = "Run `dashauth login` to sign in with Google.";

/// Picks the screen for `session`: loading, login, or dashboard.
///
/// Only the session is consulted; `last_error` is whatever the caller wants
/// surfaced on the login screen.
pub fn render(session: &Session, last_error: Option<&str>) -> String {
    match (session.phase, &session.user) {
        (SessionPhase::Restoring, _) => "Restoring session...".to_string(),
        (SessionPhase::Authenticating, _) => "Signing in...".to_string(),
        (SessionPhase::Authenticated, Some(user)) => render_dashboard(user),
        _ => render_login(last_error),
    }
}

fn render_login(last_error: Option<&str>) -> String {
    let mut out = String::from("Not signed in.\n");
    if let Some(error) = last_error {
        out.push_str(&format!("Error: {}\n", error));
    }
    out.push_str(LOGIN_HINT);
    out
}

fn render_dashboard(user: &UserProfile) -> String {
    let name = user.display_name().unwrap_or_else(|| "there".to_string());
    let mut out = format!("Welcome, {}!\n", name);
    let rows = [
        ("Name", user.display_name()),
        ("Email", user.email()),
        ("ID", user.id()),
    ];
    for (label, value) in rows {
        out.push_str(&format!(
            "  {:<6} {}\n",
            format!("{}:", label),
            value.unwrap_or_else(|| "-".to_string())
        ));
    }
    out.trim_end().to_string()
}
