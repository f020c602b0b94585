use std::path::Path;

use clap::Parser;
use tracing::info;

use gatewatch_orchestrator::api::{self, AppState};
use gatewatch_orchestrator::config::GatewatchConfig;
use gatewatch_orchestrator::Orchestrator;

/// Gatewatch tactical-intelligence pipeline.
#[derive(Parser, Debug)]
#[command(name = "gatewatch", about = "Real-time gatecamp detection and watchlist alerting")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gatewatch.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config: GatewatchConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        toml::from_str("")?
    };

    let host = cli.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);

    let orchestrator = Orchestrator::bootstrap(config).await?;
    let start_result = orchestrator.start().await;
    if !start_result.ok {
        tracing::warn!(detail = %start_result.detail, "pipeline did not start cleanly, serving control surface anyway");
    }

    let app = api::router(AppState { orchestrator: orchestrator.clone() });

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "gatewatch listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.stop().await;
    info!("gatewatch shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
