// ABOUTME: CLI entry point for eventstreamd
// ABOUTME: Resolves config, initializes logging, then hands off to server::run

use clap::Parser as _;
use eventstreamd::config::{Cli, Config};
use eventstreamd::errors::EventStreamError;
use eventstreamd::logging::LoggingConfig;
use eventstreamd::server;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match Config::resolve(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("eventstreamd: {error}");
            return std::process::ExitCode::from(2);
        }
    };

    if let Err(error) = LoggingConfig::from_env().with_debug(config.debug).init() {
        eprintln!("eventstreamd: failed to initialize logging: {error}");
        return std::process::ExitCode::from(2);
    }

    match server::run(config, server::default_auth_provider()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(EventStreamError::ServerAlreadyRunning) => {
            tracing::error!("another instance is already running on the configured socket");
            std::process::ExitCode::from(1)
        }
        Err(error) => {
            tracing::error!(%error, "eventstreamd exited with an error");
            std::process::ExitCode::from(1)
        }
    }
}
