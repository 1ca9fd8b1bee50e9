//! Casino rooms server
//!
//! Runs every game room on a shared scheduler and serves the WebSocket
//! protocol plus health, room and metrics endpoints.

use casino_rooms::{
    config::{ConfigLoader, EngineConfig},
    errors::CasinoResult,
    factory::CasinoFactory,
    games::SecureOutcomeGenerator,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "casino-rooms")]
#[command(about = "Real-time multiplayer betting rooms", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen host, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the configuration
    #[arg(long)]
    port: Option<u16>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Write the default configuration to this path and exit
    #[arg(long)]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> CasinoResult<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "casino_rooms=debug,tower_http=debug"
    } else {
        "casino_rooms=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    if let Some(path) = args.write_default_config {
        ConfigLoader::save(&EngineConfig::default(), &path)?;
        info!("📝 Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("🎰 Starting casino rooms v{}", env!("CARGO_PKG_VERSION"));
    if config.users.is_empty() {
        warn!("⚠️  No users configured; every bet will fail with an unknown user");
    }

    let store = CasinoFactory::seeded_store(&config);
    let casino = CasinoFactory::create(
        config,
        store.clone(),
        store,
        Arc::new(SecureOutcomeGenerator::new()),
    )?;

    let scheduler = casino.scheduler().spawn();
    let result = casino.server().run().await;
    scheduler.abort();

    result?;
    Ok(())
}
