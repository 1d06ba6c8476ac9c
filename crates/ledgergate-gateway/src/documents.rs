//! Off-chain policy document store.
//!
//! Documents are fetched by the location recorded on the ledger and checked
//! against the pinned hash by the resolver; the store itself only moves bytes.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use ledgergate_core::error::{LedgerGateError, Result};

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// Fetches documents over HTTP(S).
pub struct HttpPolicyStore {
    client: reqwest::Client,
}

impl HttpPolicyStore {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for HttpPolicyStore {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| LedgerGateError::UpstreamUnavailable(format!("policy fetch {location}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LedgerGateError::UpstreamUnavailable(format!(
                "policy fetch {location}: status {status}"
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| LedgerGateError::UpstreamUnavailable(format!("policy fetch {location}: {e}")))?;
        Ok(body.to_vec())
    }
}

/// In-process document store, counting fetches.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    docs: DashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, location: &str, body: impl Into<Vec<u8>>) {
        self.docs.insert(location.to_string(), body.into());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.docs
            .get(location)
            .map(|d| d.value().clone())
            .ok_or_else(|| LedgerGateError::UpstreamUnavailable(format!("no document at {location}")))
    }
}
