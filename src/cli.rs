//! Command-line surface: each command reads or drives the session and prints
//! the result.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use tracing::warn;

use crate::client::ApiRequest;
use crate::config::schema_json;
use crate::error::SessionError;
use crate::models::token::mask_token;
use crate::models::Session;
use crate::startup::App;
use crate::view::render;

#[derive(Parser, Debug)]
#[command(name = "dashauth")]
#[command(version)]
#[command(about = "Google sign-in and session client for the dashboard backend")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restore the stored session and show it
    Status,
    /// Sign in with Google
    Login {
        /// Use this Google access token instead of running the browser flow
        #[arg(long)]
        token: Option<String>,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// Print the signed-in user's profile
    Whoami,
    /// Ask the backend whether the stored access token is still valid
    Verify,
    /// Send an authenticated request to the backend
    Request {
        #[arg(value_parser = parse_method)]
        method: Method,
        /// Path relative to `api_base_url`, e.g. /user/
        path: String,
        /// JSON request body
        #[arg(long, value_parser = parse_json)]
        body: Option<Value>,
    },
    /// Talk to the public chat assistant
    Chat {
        message: String,
        /// Continue an existing conversation
        #[arg(long, value_name = "ID")]
        thread: Option<String>,
    },
    /// Read or create user records
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Print the configuration JSON schema
    Schema,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Fetch a user by id
    Get { id: u64 },
    /// Create a user from a JSON object
    Create {
        #[arg(value_parser = parse_json)]
        data: Value,
    },
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("'{}' is not an HTTP method", raw))
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))
}

fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Runs one command against a built app.
///
/// Failures the user should see on the login screen are rendered and turned
/// into a failing exit code; everything else comes back as an error.
pub async fn execute(app: &App, command: Command) -> Result<ExitCode, SessionError> {
    match command {
        Command::Status => {
            let restored = app.controller.initialize().await;
            let error = restored.err().map(|e| e.to_string());
            println!("{}", render(&app.controller.session(), error.as_deref()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Login { token } => {
            let result = match token {
                Some(token) => app.controller.login(&token).await,
                None => app.controller.login_with(app.bridge.as_ref()).await,
            };
            let error = result.as_ref().err().map(|e| e.to_string());
            println!("{}", render(&app.controller.session(), error.as_deref()));
            Ok(exit_code(result.is_ok()))
        }
        Command::Logout => {
            if let Some(notification) = app.controller.logout() {
                if let Err(e) = notification.await {
                    warn!("Logout notification task failed: {}", e);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Whoami => {
            let restored = app.controller.initialize().await;
            let session = app.controller.session();
            match (&session.user, restored) {
                (Some(user), Ok(())) if session.is_authenticated() => {
                    print_json(user.as_value());
                    Ok(ExitCode::SUCCESS)
                }
                (_, restored) => {
                    let error = restored.err().map(|e| e.to_string());
                    println!("{}", render(&session, error.as_deref()));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Verify => {
            let Some(token) = app.api.tokens().access_token() else {
                println!("{}", render(&Session::anonymous(), None));
                return Ok(ExitCode::FAILURE);
            };
            let valid = app.api.verify_token(&token).await?;
            if valid {
                println!("Access token {} is valid", mask_token(&token));
            } else {
                println!("Access token {} is invalid or expired", mask_token(&token));
            }
            Ok(exit_code(valid))
        }
        Command::Request { method, path, body } => {
            let mut request = ApiRequest::new(method, path);
            if let Some(body) = body {
                request = request.with_json(body);
            }
            let response = app.api.send(request).await?;
            print_json(&response.body);
            Ok(ExitCode::SUCCESS)
        }
        Command::Chat { message, thread } => {
            let reply = app.api.chat(&message, thread.as_deref()).await?;
            println!("{}", reply.reply);
            if let Some(thread_id) = reply.thread_id {
                eprintln!("thread: {}", thread_id);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::User { command } => {
            let user = match command {
                UserCommand::Get { id } => app.api.get_user(id).await?,
                UserCommand::Create { data } => app.api.create_user(data).await?,
            };
            print_json(user.as_value());
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema => {
            println!("{}", schema_json());
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_login_with_token() {
        let cli = Cli::try_parse_from(["dashauth", "login", "--token", "ya29.x"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(matches!(cli.command, Command::Login { token: Some(t) } if t == "ya29.x"));
    }

    #[test]
    fn test_parse_request() {
        let cli = Cli::try_parse_from([
            "dashauth",
            "--config",
            "/etc/dashauth.yaml",
            "request",
            "post",
            "/users/",
            "--body",
            r#"{"email": "a@example.com"}"#,
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/dashauth.yaml"));
        match cli.command {
            Command::Request { method, path, body } => {
                assert_eq!(method, Method::POST);
                assert_eq!(path, "/users/");
                assert_eq!(body, Some(json!({"email": "a@example.com"})));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_json_body() {
        assert!(Cli::try_parse_from(["dashauth", "user", "create", "{not json"]).is_err());
    }

    #[test]
    fn test_parse_chat_with_thread() {
        let cli =
            Cli::try_parse_from(["dashauth", "chat", "hello", "--thread", "t-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Chat { message, thread: Some(thread) } if message == "hello" && thread == "t-1"
        ));
    }
}
