//! ledgergate gateway library.
//!
//! Wires token verification, policy resolution and the realtime gateway
//! behind an axum HTTP/WebSocket boundary. Used by the binary (`main.rs`)
//! and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod auth;
pub mod cache;
pub mod config;
pub mod documents;
pub mod ingest;
pub mod ledger;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod realtime;
pub mod router;
pub mod supervise;
pub mod transport;
