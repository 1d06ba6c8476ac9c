use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ledgergate_core::error::Result;

use super::Cache;
use crate::obs::GatewayMetrics;

/// Counts hits and misses of the wrapped cache.
pub struct MeteredCache {
    inner: Arc<dyn Cache>,
    metrics: Arc<GatewayMetrics>,
}

impl MeteredCache {
    pub fn new(inner: Arc<dyn Cache>, metrics: Arc<GatewayMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl Cache for MeteredCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.inner.get(key).await?;
        let outcome = if value.is_some() { "hit" } else { "miss" };
        self.metrics.cache_lookups.inc(&[("outcome", outcome)]);
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }
}
