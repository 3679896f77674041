//! Talon CI scheduling server.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use talon_core::events::Event;
use talon_scheduler::{Scheduler, SystemClock};
use talon_store::{BroadcastEventBus, Store};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod seed;

use config::{LogFormat, ServerConfig};
use seed::SeedFile;

#[derive(Parser)]
#[command(name = "talond")]
#[command(author, version, about = "Talon CI scheduling server", long_about = None)]
struct Cli {
    /// Path to the server configuration file.
    #[arg(short, long, default_value = "talon.yaml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// YAML file of pipeline definitions and agents to preload.
    #[arg(long)]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    init_tracing(cli.json_logs || config.log_format == LogFormat::Json);

    let scheduler_config = config
        .scheduler_config()
        .context("invalid scheduler configuration")?;

    let store = Store::new();
    let event_bus = Arc::new(BroadcastEventBus::new());
    let scheduler = Arc::new(Scheduler::new(
        scheduler_config,
        store.pipelines.clone(),
        store.agents.clone(),
        store.definitions.clone(),
        event_bus.clone(),
        Arc::new(SystemClock),
    ));

    if let Some(path) = &cli.seed {
        SeedFile::from_file(path)?.apply(&store, &scheduler).await?;
    }

    let events = spawn_event_log(event_bus.subscribe());
    let handle = scheduler.clone().spawn();
    info!(config = %cli.config.display(), "talond started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    events.abort();
    info!("talond stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,talon=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Log every domain event until the bus closes.
fn spawn_event_log(mut rx: broadcast::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(subject = %event.subject(), ?event, "Event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
