//! ledgergate core: wire formats, digests, and the error taxonomy shared by the
//! access-control engine.
//!
//! This crate defines the token format, the realtime handshake, the Keccak
//! digest used to pin off-chain policy bodies, and the error surface that both
//! the HTTP and realtime boundaries map from. It carries no transport or
//! runtime dependencies so clients can sign tokens with it directly.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `LedgerGateError`/`Result` so malformed tokens or hostile input
//! never bring a process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod hash;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, LedgerGateError, Result};
