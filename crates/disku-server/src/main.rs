use anyhow::Result;
use clap::Parser;
use disku_alert::units::parse_interval;
use disku_notify::plugin::ChannelRegistry;
use disku_server::app;
use disku_server::config::ServerConfig;
use disku_server::engine::ReportEngine;
use disku_server::logging;
use disku_server::state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// disku - disk usage alerting server
#[derive(Parser, Debug)]
#[command(name = "disku-server", version, about)]
struct Cli {
    /// Path to the TOML config file (defaults to $DISKU_CONFIG_FILE, then config/server.toml)
    config: Option<PathBuf>,

    /// Which address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Which port to bind
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("disku=info")?;

    let cli = Cli::parse();
    let mut config = ServerConfig::resolve(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    run_server(config).await
}

async fn run_server(config: ServerConfig) -> Result<()> {
    tracing::info!(
        bind = %config.server.bind,
        port = config.server.port,
        channel = %config.disku.alert_channel,
        "disku-server starting"
    );

    let engine = Arc::new(ReportEngine::from_config(&config, ChannelRegistry::default())?);
    let flush_tick = parse_interval(&config.disku.flush_tick)?;

    let state = AppState {
        engine: engine.clone(),
        config: Arc::new(config.clone()),
    };

    let flush_handle = if flush_tick > 0 {
        Some(tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(flush_tick));
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                engine.flush_due().await;
            }
        }))
    } else {
        tracing::info!("Periodic flush disabled, alerts flush on incoming reports");
        None
    };

    let listener =
        tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
    tracing::info!(http = %listener.local_addr()?, "Server started");

    let result = axum::serve(listener, app::build_http_app(state))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(h) = flush_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(result?)
}
