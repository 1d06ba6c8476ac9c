//! Transport layer: HTTP routes and the realtime WebSocket endpoint.

pub mod http;
pub mod ws;
