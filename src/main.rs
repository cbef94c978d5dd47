//! sslwatch binary entry point.
//!
//! Loads the YAML configuration, builds the exporter with the built-in
//! probers, and serves the scrape endpoint.

use std::net::SocketAddr;

use clap::Parser;
use prometheus::Registry;
use sslwatch::{
    config::AppConfig,
    exporter::Exporter,
    prober::ProberTable,
    server::{create_router, AppState},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// sslwatch - SSL/TLS certificate metrics exporter
#[derive(Parser, Debug)]
#[command(name = "sslwatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/sslwatch.yaml",
        env = "SSLWATCH_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "SSLWATCH_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "SSLWATCH_SERVER_PORT")]
    server_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sslwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }

    tracing::info!(
        targets = config.targets.len(),
        modules = config.modules.len(),
        "configuration loaded"
    );

    let exporter = Exporter::new(&config, ProberTable::builtin())?;
    let registry = Registry::new();
    registry.register(Box::new(exporter))?;

    let state = AppState {
        registry,
        targets: config.targets.len(),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "sslwatch listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
