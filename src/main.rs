// SPDX-License-Identifier: GPL-3.0-only
mod config;
mod diff;
mod logging;
mod mapping;
mod provider;
mod store;
mod sync;

#[cfg(test)]
mod test_helpers;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use config::Config;
use logging::setup_logging;
use provider::{CarInfoClient, ListingProvider};
use store::SqliteStore;
use sync::{SyncMode, SyncOrchestrator};

#[derive(Debug, Parser)]
#[command(version, about = "Synchronize classified car listings into a local store")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CARADS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest every listing the provider pages through
    Crawl,
    /// Re-fetch all stored listings and patch what changed
    Refresh,
    /// Fill in images for stored listings that have none
    Images,
}

impl From<Command> for SyncMode {
    fn from(command: Command) -> Self {
        match command {
            Command::Crawl => SyncMode::Crawl,
            Command::Refresh => SyncMode::Refresh,
            Command::Images => SyncMode::Images,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_format)?;

    info!("Starting car-ads-sync v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    let store = Arc::new(SqliteStore::new(&config.database_path).await?);
    info!("Listing store opened at {}", config.database_path.display());

    let provider: Arc<dyn ListingProvider> = Arc::new(CarInfoClient::new(
        config.provider_api_url.clone(),
        config.provider_auth_identifier.as_deref().unwrap_or_default(),
        config.provider_auth_key.as_deref().unwrap_or_default(),
        config.request_timeout(),
    )?);

    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        store,
        provider,
        config.sync_settings(),
    );

    let summary = orchestrator.run(cli.command.into()).await;
    println!("{summary}");

    if summary.aborted {
        anyhow::bail!("{} run aborted before completion", summary.mode);
    }
    Ok(())
}
