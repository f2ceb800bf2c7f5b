//! authgate - authentication front-end delegating identity to WorkOS AuthKit

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use authgate::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    provider::{AuthProvider, WorkOsClient},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        if let Err(e) = dotenvy::from_path(path) {
            eprintln!("Failed to load env file {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    } else {
        // optional; absent .env is normal
        let _ = dotenvy::dotenv();
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            if let Some(ref level) = cli.log_level {
                config.log.level = Some(level.clone());
            }
            if let Some(ref format) = cli.log_format {
                config.log.format = Some(format.clone());
            }
            config
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = setup_tracing(config.log_level(), config.log.format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = config.validate() {
        error!("Environment validation failed: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Check) => run_check(&config).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Validate provider connectivity
async fn run_check(config: &Config) -> ExitCode {
    info!("Environment configuration is valid");

    let client = match WorkOsClient::new(&config.provider) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create provider client: {e}");
            return ExitCode::FAILURE;
        }
    };

    match client.list_users(1).await {
        Ok(_) => {
            info!(api_url = %config.provider.api_url, "Identity provider reachable");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Identity provider check failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        port = config.server.port,
        "Starting authgate"
    );

    if config.session.cookie.secure && config.app_url.starts_with("http://") {
        warn!(
            app_url = %config.app_url,
            "Secure session cookies are not sent over plain http"
        );
    }

    let gateway = match Gateway::new(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to create provider client: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
