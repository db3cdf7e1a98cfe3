//! Failover Reverse Proxy
//!
//! Serves `<name>.<anything>.<tld>` by forwarding to `<name><primary_suffix>.<domain>`,
//! falling back to `<name><secondary_suffix>.<domain>`.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────────┐
//!                      │                     FAILOVER PROXY                        │
//!                      │                                                           │
//!     Client Request   │  ┌─────────┐    ┌──────────┐    ┌──────────────┐          │
//!     ─────────────────┼─▶│  http   │───▶│ routing  │───▶│    proxy     │──────────┼──▶ Primary
//!                      │  │ server  │    │ host key │    │ orchestrator │──────────┼──▶ Secondary
//!                      │  └────┬────┘    └──────────┘    └──────┬───────┘          │
//!                      │       │ upgrade                        │                  │
//!                      │       ▼                                ▼                  │
//!                      │  ┌──────────┐                   ┌──────────────┐          │
//!     ◀────────────────┼──│websocket │◀─────────────────▶│   rewrite    │          │
//!     Client Response  │  │  relay   │   (secondary)     │ decode/swap/ │          │
//!                      │  └──────────┘                   │   encode     │          │
//!                      │                                 └──────────────┘          │
//!                      │  ┌────────────────────────────────────────────────────┐   │
//!                      │  │  config · observability · lifecycle · error        │   │
//!                      │  └────────────────────────────────────────────────────┘   │
//!                      └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use failover_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use failover_proxy::lifecycle::{wait_for_signal, Shutdown};
use failover_proxy::observability::{logging, metrics};
use failover_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "failover-proxy")]
#[command(about = "Host-routed reverse proxy with primary/secondary failover", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

fn resolve_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!("failover-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        domain = %config.upstream.domain,
        primary_suffix = %config.upstream.primary_suffix,
        secondary_suffix = %config.upstream.secondary_suffix,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address when metrics are enabled
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal, "Signal received, draining");
            shutdown.trigger();
        }
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
