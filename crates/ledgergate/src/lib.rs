//! Top-level facade crate for ledgergate.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use ledgergate_core::*;
}

pub mod gateway {
    pub use ledgergate_gateway::*;
}
