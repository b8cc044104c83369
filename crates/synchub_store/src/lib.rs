//! # SyncHub Store
//!
//! Entity container contract and in-memory reference container.
//!
//! This crate provides:
//! - [`EntityContainer`]: the abstract storage interface every task
//!   variant executes against
//! - [`InMemoryContainer`]: a synchronous reference implementation used
//!   by tests and demos
//! - [`CommandError`]: whole-task storage failures
//!
//! Containers are pluggable: the hub never interprets storage semantics
//! beyond this contract. Partial failure is first-class; a container call
//! may fail as a whole ([`CommandError`]) or succeed while reporting
//! per-entity errors inside its payload.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod container;
mod error;
mod filter;
mod memory;

pub use container::{EntityContainer, ExecutionContext};
pub use error::{CommandError, StoreResult};
pub use filter::filter_matches;
pub use memory::InMemoryContainer;
