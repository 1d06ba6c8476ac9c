//! TTL key/value cache abstraction.
//!
//! Verification components only see [`Cache`]; any backend that can store a
//! string under a key for a bounded time satisfies it. Values are JSON so the
//! typed helpers below can round-trip records without the backend knowing
//! their shape.

mod memory;
mod metered;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use ledgergate_core::error::{LedgerGateError, Result};

use crate::supervise::Shutdown;

pub use memory::MemoryCache;
pub use metered::MeteredCache;

/// Narrow get/set-with-TTL store shared by all verifiers.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Drop expired entries, returning how many went. Backends that expire
    /// on their own keep the default.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Sweep `cache` every `every` until shutdown.
pub async fn run_purge(cache: Arc<dyn Cache>, every: Duration, mut shutdown: Shutdown) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired cache entries purged");
                }
            }
        }
    }
}

/// Read a JSON record. A record that no longer decodes counts as a miss.
pub async fn get_record<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>> {
    let Some(json) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&json) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable cache record");
            Ok(None)
        }
    }
}

/// Store a JSON record for `ttl`.
pub async fn set_record<T: Serialize + ?Sized>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| LedgerGateError::Internal(format!("cache encode failed: {e}")))?;
    cache.set(key, json, ttl).await
}

/// Registered identity of a contract.
pub fn contract_key(contract: &str) -> String {
    contract.to_string()
}

/// Resolved policy for a resource (off-chain body or on-chain marker).
pub fn policy_key(contract: &str, resource: &str) -> String {
    format!("{contract}_{resource}")
}

/// Serialized OCP record for a resource.
pub fn ocp_key(contract: &str, resource: &str) -> String {
    format!("{contract}_ocp_{resource}")
}

/// One named OCP parameter.
pub fn ocp_param_key(contract: &str, resource: &str, param: &str) -> String {
    format!("{contract}_ocp_{resource}_{param}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::supervise::shutdown_channel;

    #[tokio::test(start_paused = true)]
    async fn purge_task_sweeps_until_shutdown() {
        let memory = Arc::new(MemoryCache::new());
        memory.set("short", "1".into(), Duration::from_secs(5)).await.unwrap();
        memory.set("long", "2".into(), Duration::from_secs(3600)).await.unwrap();

        let (trigger, shutdown) = shutdown_channel();
        let cache: Arc<dyn Cache> = memory.clone();
        let task = tokio::spawn(run_purge(cache, Duration::from_secs(10), shutdown));

        // Nothing reads "short" again; only the sweep can remove it.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(memory.len(), 1);

        trigger.trigger();
        task.await.unwrap();
    }

    #[test]
    fn key_shapes() {
        assert_eq!(contract_key("0xc"), "0xc");
        assert_eq!(policy_key("0xc", "temperature"), "0xc_temperature");
        assert_eq!(ocp_key("0xc", "temperature"), "0xc_ocp_temperature");
        assert_eq!(
            ocp_param_key("0xc", "temperature", "max_items"),
            "0xc_ocp_temperature_max_items"
        );
    }
}
