//! Wire formats: the signed access token and the realtime messages.
//!
//! All parsers are panic-free: malformed input is reported as
//! `LedgerGateError` instead of panicking or indexing raw buffers.

pub mod realtime;
pub mod token;
