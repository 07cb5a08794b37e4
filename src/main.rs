//! notesrv - disposable note sharing server
//!
//! Loads the configuration, opens the note store, starts the prune sweeper
//! and hands the API over to rocket.

use anyhow::{bail, Context};
use clap::Parser;
use notesrv::api::ApiHandler;
use notesrv::config::{AppConfig, DEFAULT_CONFIG_FILE};
use notesrv::notes::{NoteService, PruneSweeper, SweeperConfig};
use notesrv::server::{build_rocket, rocket_figment};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line options. Anything given here wins over the configuration file.
#[derive(Debug, Parser)]
#[command(name = "notesrv", version, about = "Self-destructing note sharing server")]
struct CliConfig {
    /// Path of the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Address to bind to
    #[arg(short, long)]
    address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    init_logging();

    if !cli.config_file.exists() {
        AppConfig::write_default(&cli.config_file).with_context(|| {
            format!("cannot write default config to {}", cli.config_file.display())
        })?;
        println!(
            "Wrote a default configuration to {}. Please edit it, then start notesrv again.",
            cli.config_file.display()
        );
        return Ok(());
    }

    let mut config = AppConfig::load(&cli.config_file)
        .with_context(|| format!("cannot load {}", cli.config_file.display()))?;
    if let Some(address) = cli.address {
        config.address = address;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        version = notesrv::VERSION,
        address = %config.address,
        port = config.port,
        "Starting notesrv"
    );

    let database = config.database.clone();
    let store = tokio::task::spawn_blocking(move || database.open_store())
        .await
        .context("note store setup panicked")?
        .context("cannot open note store")?;
    let notes = NoteService::new(store);

    let sweeper = PruneSweeper::start(
        notes.clone(),
        SweeperConfig {
            interval: config.prune_interval(),
        },
    );

    let rocket = build_rocket(
        rocket_figment(&config),
        ApiHandler::new(notes),
        config.static_dir.as_deref(),
    );
    let result = rocket.launch().await;
    sweeper.stop();

    if let Err(e) = result {
        bail!("server failed: {}", e.kind());
    }

    info!("Server shutdown complete");
    Ok(())
}
