//! # SyncHub Engine
//!
//! Task batch executor, subscription registry, and event dispatcher.
//!
//! This crate provides:
//! - [`TaskBatchExecutor`]: runs an ordered batch of tasks against a
//!   container with task-level failure isolation
//! - [`SubscriptionRegistry`]: per-database message and change
//!   subscription indexes
//! - [`ClientSessions`] / [`EventDispatcher`]: per-client ordered,
//!   ack-trimmed reliable event delivery
//! - [`SyncHub`]: the facade tying the pieces together per database
//!
//! ## Architecture
//!
//! One [`SyncHub`] owns any number of named databases, each a pluggable
//! [`EntityContainer`](synchub_store::EntityContainer) paired with its own
//! subscription registry. Requests enter through [`SyncHub::handle`], which
//! behaves identically whether the caller is local, an HTTP adapter, or a
//! WebSocket adapter.
//!
//! ## Key invariants
//!
//! - `response.tasks[i]` answers `request.tasks[i]`; one task failing never
//!   aborts or skips its siblings
//! - per client, event `seq` is strictly increasing by 1 with no gaps, and
//!   delivery order equals seq order
//! - acknowledging seq `k` drops every queued event with `seq <= k`
//! - rebinding a client's transport target never resets `seq` or loses the
//!   unacknowledged queue

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod executor;
mod hub;
mod registry;
mod session;

pub use config::{AllowAll, HubConfig, TaskAuthorizer};
pub use dispatcher::{DeliveryOutcome, EventDispatcher};
pub use error::{HubError, HubResult};
pub use executor::{BatchOutcome, ExecutorState, TaskBatchExecutor};
pub use hub::SyncHub;
pub use registry::{ChangeSubscription, SubscriptionRegistry};
pub use session::{ClientSessions, EventTarget, SessionSnapshot};
