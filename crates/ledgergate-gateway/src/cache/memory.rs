use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use ledgergate_core::error::{LedgerGateError, Result};

use super::Cache;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache (absolute expiry, lazily evicted).
#[derive(Debug, Default)]
pub struct MemoryCache {
    map: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        if let Some(e) = self.map.get(key) {
            if e.expires_at > now {
                return Ok(Some(e.value.clone()));
            }
        }
        // Expired: evict unless a writer refreshed it meanwhile.
        self.map.remove_if(key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| LedgerGateError::Internal(format!("cache ttl out of range: {ttl:?}")))?;
        self.map.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.map.len())
    }
}
