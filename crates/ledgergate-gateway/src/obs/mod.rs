//! Observability: Prometheus-text metrics and tracing setup.

pub mod metrics;

pub use metrics::GatewayMetrics;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
}
