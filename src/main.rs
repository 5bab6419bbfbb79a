//! Main entry point for the portal-harvest CLI

use clap::Parser;
use portal_harvest::cli::{Cli, Commands};
use portal_harvest::shutdown::{spawn_ctrl_c_listener, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("portal_harvest=info"));

    // Logs go to stderr so stdout carries only command output
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match &cli.command {
        Commands::Harvest(args) => {
            let shutdown = ShutdownCoordinator::shared();
            spawn_ctrl_c_listener(shutdown.clone());
            args.execute(config_path, shutdown)
                .await
                .map(|_| ())
                .map_err(|e| anyhow::anyhow!(e))
        }
        Commands::Resources(args) => args.execute(),
        Commands::Plan(args) => args.execute(config_path),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
