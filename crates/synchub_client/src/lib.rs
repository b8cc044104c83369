//! # SyncHub Client
//!
//! Duplex client and request correlation layer.
//!
//! This crate provides:
//! - [`PendingRequests`]: pairs outbound requests with inbound responses
//!   on connections carrying multiple in-flight requests
//! - [`DuplexTransport`]: the framed transport seam, with a
//!   [`MockTransport`] for tests
//! - [`DuplexClient`]: a client whose single driver task owns the
//!   connection, serializing all outbound frames and routing inbound
//!   frames to waiting requests or the event stream
//!
//! ## Key invariants
//!
//! - every request carries a `req` id unique among that connection's
//!   outstanding requests; the matching response echoes it
//! - responses may complete out of order; completion never assumes FIFO
//! - a response with an unknown `req` is a protocol violation
//! - connection loss resolves every pending request as cancelled, never
//!   leaving one dangling

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod correlation;
mod error;
mod transport;

pub use client::DuplexClient;
pub use correlation::PendingRequests;
pub use error::{ClientError, ClientResult};
pub use transport::{DuplexTransport, MockRemote, MockTransport};
