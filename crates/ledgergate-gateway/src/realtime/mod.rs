//! Realtime authorization gateway.
//!
//! Peers are admitted once by token, then every reading on their resource
//! is re-checked against the contract's policy before delivery.

mod gateway;
mod pump;
mod registry;
pub mod types;

pub use gateway::{FanOutReport, RealtimeGateway};
pub use pump::{Pump, PumpEvent, PumpHandle};
pub use registry::{PeerRegistry, RealtimePeer};
pub use types::{error_frame, QoS, SendFailure};
