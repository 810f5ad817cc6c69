use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dashauth::cli::{Cli, Command};
use dashauth::config::{load_config, schema_json};
use dashauth::startup::run;
use dashauth::utils::logger::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The schema does not depend on a config file being present.
    if let Command::Schema = cli.command {
        println!("{}", schema_json());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Failed to load configuration from {}: {}",
                cli.config.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(Arc::new(config), cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
