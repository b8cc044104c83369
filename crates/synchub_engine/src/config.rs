//! Hub configuration and the task authorization hook.

use std::sync::Arc;
use synchub_protocol::Task;
use synchub_store::ExecutionContext;

/// Authorization hook consulted before each task reaches storage.
///
/// This is the only policy surface the hub defines: a rejected task fails
/// its slot with `PermissionDenied` and never reaches the container. What
/// "authorized" means (tokens, roles, per-container ACLs) is entirely up to
/// the implementation.
pub trait TaskAuthorizer: Send + Sync {
    /// Returns true if the task may execute in the given context.
    fn authorize(&self, task: &Task, token: Option<&str>, ctx: &ExecutionContext) -> bool;
}

/// The default authorizer; permits every task.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl TaskAuthorizer for AllowAll {
    fn authorize(&self, _task: &Task, _token: Option<&str>, _ctx: &ExecutionContext) -> bool {
        true
    }
}

/// Configuration for a [`SyncHub`](crate::SyncHub).
#[derive(Clone)]
pub struct HubConfig {
    /// Database used when a request names none.
    pub default_database: String,
    /// Whether stacktraces are attached to unhandled-exception results.
    pub reveal_stacktraces: bool,
    /// Whether sessions created on first subscribe queue events for
    /// reconnect delivery.
    pub queue_events: bool,
    /// Upper bound on a session's unacknowledged queue; the oldest entries
    /// are evicted beyond it.
    pub max_queued_events: usize,
    /// The authorization hook.
    pub authorizer: Arc<dyn TaskAuthorizer>,
}

impl HubConfig {
    /// Creates a configuration with the given default database.
    pub fn new(default_database: impl Into<String>) -> Self {
        Self {
            default_database: default_database.into(),
            reveal_stacktraces: false,
            queue_events: true,
            max_queued_events: 10_000,
            authorizer: Arc::new(AllowAll),
        }
    }

    /// Enables stacktraces on unhandled-exception results.
    #[must_use]
    pub fn with_stacktraces(mut self) -> Self {
        self.reveal_stacktraces = true;
        self
    }

    /// Sets whether new sessions queue events.
    #[must_use]
    pub fn with_queue_events(mut self, queue: bool) -> Self {
        self.queue_events = queue;
        self
    }

    /// Sets the unacknowledged queue bound.
    #[must_use]
    pub fn with_max_queued_events(mut self, max: usize) -> Self {
        self.max_queued_events = max;
        self
    }

    /// Installs an authorizer.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn TaskAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("default_database", &self.default_database)
            .field("reveal_stacktraces", &self.reveal_stacktraces)
            .field("queue_events", &self.queue_events)
            .field("max_queued_events", &self.max_queued_events)
            .finish_non_exhaustive()
    }
}
