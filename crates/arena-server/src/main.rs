//! Standalone arena server over the in-memory backend.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, trace, warn};

use arena_config::{CliArgs, Config, default_config_dir};
use arena_protocol::ChannelBroadcaster;
use arena_server::{Backend, Orchestrator, Sessions, World, demo};
use arena_store::{MemoryStore, StaticCatalog};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_dir.display());
            Config::default()
        }
    };
    config.apply_cli_overrides(&args);
    arena_log::init_logging(args.log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    let store = Arc::new(MemoryStore::new());
    demo::seed_store(&store).await;

    let (events, mut outbound) = ChannelBroadcaster::channel();
    let world = Arc::new(World::new(
        config,
        Backend::memory(store, StaticCatalog::with_defaults()),
        Arc::new(events),
    ));
    demo::spawn_wildlife(&world);

    // Stand-in for a transport: serialize and trace every outbound event.
    let transport = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            match serde_json::to_string(&out.event) {
                Ok(json) => trace!(target: "arena_server::outbound", "{:?} {json}", out.to),
                Err(e) => warn!("Could not encode {}: {e}", out.event.name()),
            }
        }
    });

    let sessions = Arc::new(Sessions::new(world));
    let orchestrator = Orchestrator::start(sessions);
    info!("Arena server running, ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for ctrl-c: {e}");
    }
    info!("Shutting down");
    orchestrator.shutdown().await;
    transport.abort();
}
