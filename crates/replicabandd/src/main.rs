//! replicabandd — the replicaband daemon.
//!
//! Single binary wiring the controller to its collaborators:
//! - TOML configuration (scaling band, control-plane endpoint, retry
//!   budget), loaded once at startup
//! - HTTP control-plane client
//! - Notification endpoint (one controller invocation per delivery)
//!
//! # Usage
//!
//! ```text
//! replicabandd serve --config replicaband.toml --port 8080
//! ```

mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use replicaband_controller::ScalingController;
use replicaband_core::ControllerConfig;
use replicaband_lifecycle::HttpLifecycleClient;

#[derive(Parser)]
#[command(name = "replicabandd", about = "replicaband scaling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the notification endpoint.
    Serve {
        /// Path to the configuration file.
        #[arg(long, default_value = "replicaband.toml")]
        config: PathBuf,

        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Validate a configuration file and exit.
    CheckConfig {
        /// Path to the configuration file.
        #[arg(long, default_value = "replicaband.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,replicaband=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, port } => serve(config, port).await,
        Command::CheckConfig { config } => {
            let loaded = ControllerConfig::from_file(&config)?;
            info!(
                min = loaded.policy.min_replicas,
                max = loaded.policy.max_replicas,
                endpoint = %loaded.control_plane.endpoint,
                "configuration is valid"
            );
            Ok(())
        }
    }
}

async fn serve(config_path: PathBuf, port: u16) -> anyhow::Result<()> {
    let config = ControllerConfig::from_file(&config_path)?;
    info!(
        path = ?config_path,
        min = config.policy.min_replicas,
        max = config.policy.max_replicas,
        "configuration loaded"
    );

    let client = Arc::new(HttpLifecycleClient::new(
        config.control_plane.endpoint.clone(),
    ));
    let controller = ScalingController::from_config(&config, client);
    info!(endpoint = %config.control_plane.endpoint, "controller initialized");

    let router = server::build_router(controller);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "notification endpoint listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("replicabandd stopped");
    Ok(())
}
