//! Router assembly and serving.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::{http, ws};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use synchub_engine::SyncHub;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) hub: Arc<SyncHub>,
    pub(crate) config: ServerConfig,
}

/// Builds the hub router.
///
/// Routes: `GET /health`, `POST /sync` (one request, one response), and
/// `GET /ws` (duplex requests plus event push).
pub fn router(hub: Arc<SyncHub>, config: ServerConfig) -> Router {
    let state = ServerState { hub, config };
    Router::new()
        .route("/health", get(http::health))
        .route("/sync", post(http::sync_handler))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The hub server: binds a listener and serves the router until shutdown.
pub struct HubServer {
    hub: Arc<SyncHub>,
    config: ServerConfig,
}

impl HubServer {
    /// Creates a server for the given hub.
    pub fn new(hub: Arc<SyncHub>, config: ServerConfig) -> Self {
        Self { hub, config }
    }

    /// The hub this server fronts.
    pub fn hub(&self) -> &Arc<SyncHub> {
        &self.hub
    }

    /// Binds the configured address and serves requests.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "hub listening");
        axum::serve(listener, router(self.hub, self.config)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synchub_engine::HubConfig;
    use synchub_store::InMemoryContainer;

    #[test]
    fn router_builds() {
        let hub = SyncHub::new(HubConfig::default())
            .with_database("default", Arc::new(InMemoryContainer::new()));
        let _router = router(Arc::new(hub), ServerConfig::default());
    }
}
