//! Standalone hub binary backed by the in-memory container.
//!
//! Intended for demos and integration testing against a real socket; a
//! production deployment registers its own `EntityContainer` and embeds
//! [`HubServer`] instead.

use std::sync::Arc;
use synchub_engine::{HubConfig, SyncHub};
use synchub_server::{HubServer, ServerConfig};
use synchub_store::InMemoryContainer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> synchub_server::ServerResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synchub=info,synchub_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::default();
    if let Some(addr) = std::env::args().nth(1) {
        config.bind_addr = addr.parse().unwrap_or_else(|_| {
            tracing::warn!(%addr, "unparseable bind address, using default");
            ServerConfig::default().bind_addr
        });
    }

    let hub = SyncHub::new(HubConfig::default())
        .with_database("default", Arc::new(InMemoryContainer::new()));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting hub");
    HubServer::new(Arc::new(hub), config).serve().await
}
