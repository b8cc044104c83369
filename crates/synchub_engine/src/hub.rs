//! The hub facade: named databases, sessions, and request handling.

use crate::config::HubConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::{HubError, HubResult};
use crate::executor::TaskBatchExecutor;
use crate::registry::SubscriptionRegistry;
use crate::session::ClientSessions;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use synchub_protocol::{SyncRequest, SyncResponse, Task, TaskResult};
use synchub_store::{EntityContainer, ExecutionContext};

struct DatabaseState {
    container: Arc<dyn EntityContainer>,
    registry: SubscriptionRegistry,
}

/// A synchronization hub serving one or more named databases.
///
/// The hub is the transport-agnostic entry point: local callers, the HTTP
/// adapter, and the WebSocket adapter all submit requests through
/// [`handle`](Self::handle) and observe identical behavior. Each database
/// pairs a pluggable [`EntityContainer`] with its own subscription
/// registry; the client session table is shared across databases.
pub struct SyncHub {
    databases: RwLock<HashMap<String, Arc<DatabaseState>>>,
    sessions: Arc<ClientSessions>,
    dispatcher: EventDispatcher,
    config: HubConfig,
}

impl SyncHub {
    /// Creates a hub with no databases registered.
    pub fn new(config: HubConfig) -> Self {
        let sessions = Arc::new(ClientSessions::new(config.queue_events));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), config.max_queued_events);
        Self {
            databases: RwLock::new(HashMap::new()),
            sessions,
            dispatcher,
            config,
        }
    }

    /// Registers (or replaces) a database under the given name.
    pub fn register_database(&self, name: impl Into<String>, container: Arc<dyn EntityContainer>) {
        self.databases.write().insert(
            name.into(),
            Arc::new(DatabaseState {
                container,
                registry: SubscriptionRegistry::new(),
            }),
        );
    }

    /// Builder form of [`register_database`](Self::register_database).
    #[must_use]
    pub fn with_database(
        self,
        name: impl Into<String>,
        container: Arc<dyn EntityContainer>,
    ) -> Self {
        self.register_database(name, container);
        self
    }

    /// The shared client session table, for transport adapters to bind and
    /// detach event targets.
    pub fn sessions(&self) -> &Arc<ClientSessions> {
        &self.sessions
    }

    /// The hub's configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Removes a client entirely: its session and every subscription it
    /// holds in any database.
    pub fn remove_client(&self, client_id: &str) {
        for state in self.databases.read().values() {
            state.registry.remove_client(client_id);
        }
        self.sessions.remove(client_id);
    }

    /// Executes one request batch and produces its response.
    ///
    /// Fails as a whole only when the request cannot be routed (unknown
    /// database); every in-batch failure lands in a result slot instead.
    /// The request's `ack` is applied to the client's event queue before
    /// any task executes.
    pub async fn handle(&self, request: SyncRequest) -> HubResult<SyncResponse> {
        let database = request
            .database
            .clone()
            .unwrap_or_else(|| self.config.default_database.clone());
        let state = self
            .databases
            .read()
            .get(&database)
            .cloned()
            .ok_or_else(|| HubError::UnknownDatabase(database.clone()))?;

        if let (Some(client_id), Some(ack)) = (&request.client_id, request.event_ack) {
            self.sessions.acknowledge(client_id, ack);
        }

        let mut ctx = ExecutionContext::new(database);
        ctx.user_id = request.user_id.clone();

        tracing::debug!(
            database = %ctx.database,
            tasks = request.tasks.len(),
            client = request.client_id.as_deref().unwrap_or("-"),
            "handling request"
        );

        let mut executor = TaskBatchExecutor::new(
            state.container.as_ref(),
            &state.registry,
            &self.dispatcher,
            &self.sessions,
            &self.config,
            ctx,
            request.client_id.clone(),
            request.token.clone(),
        );
        let outcome = executor.execute(&request.tasks).await;

        let mut response = SyncResponse::new(outcome.results);
        response.req_id = request.req_id;
        response.client_id = request.client_id.clone();
        aggregate_entity_errors(&request.tasks, &mut response);
        Ok(response)
    }
}

/// Collects per-entity create/upsert failures into the response envelope's
/// per-container maps.
fn aggregate_entity_errors(tasks: &[Task], response: &mut SyncResponse) {
    for (task, result) in tasks.iter().zip(&response.tasks) {
        let Some(container) = task.container() else {
            continue;
        };
        match result {
            TaskResult::Create(r) if !r.errors.is_empty() => {
                response
                    .create_errors
                    .entry(container.to_string())
                    .or_default()
                    .extend(r.errors.clone());
            }
            TaskResult::Upsert(r) if !r.errors.is_empty() => {
                response
                    .upsert_errors
                    .entry(container.to_string())
                    .or_default()
                    .extend(r.errors.clone());
            }
            _ => {}
        }
    }
}
