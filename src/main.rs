//! Server Bridge
//!
//! Run with: cargo run -- --config config.toml
//!
//! Without `--config` the default locations are searched, then environment
//! variables (`BRIDGE_*`) are applied. `RUST_LOG` overrides the configured
//! log level.

use clap::Parser;
use server_bridge::api::{self, AppState};
use server_bridge::config::{generate_default_config, Config, ConfigSource, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "server-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relay chat and server events between game servers and a chat group")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let (config, source) = match &cli.config {
        Some(path) => {
            let config = Config::load_with_env(path)?;
            let source = ConfigSource::File {
                path: path.clone(),
                skipped: Vec::new(),
            };
            (config, source)
        }
        None => Config::load_default(),
    };

    init_tracing(&config.logging);
    source.log();

    tracing::info!("Starting Server Bridge v{}", env!("CARGO_PKG_VERSION"));
    if config.bridge.token.is_empty() {
        tracing::warn!("No shared token configured, any game server can connect");
    }

    let state = AppState::from_config(&config).await?;

    // Without a listening socket there is nothing to bridge
    let listener = match api::bind(&config.server.addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start WebSocket server! Check the listen address.");
            std::process::exit(1);
        }
    };

    api::serve_on(listener, state, api::shutdown_signal()).await?;

    tracing::info!("Server Bridge stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("server_bridge={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
