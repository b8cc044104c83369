//! # SyncHub Server
//!
//! Transport adapters fronting a [`SyncHub`](synchub_engine::SyncHub):
//!
//! - `POST /sync`: one request yields exactly one response, no server push
//! - `GET /ws`: duplex, requests and events flow on the same connection,
//!   responses correlate by `req` id and may complete out of order
//!
//! Each WebSocket connection serializes its outbound traffic through a
//! single writer task, and binding a `clt` id attaches the connection as
//! the live event target for that client's session.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod server;
mod ws;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{router, HubServer};
