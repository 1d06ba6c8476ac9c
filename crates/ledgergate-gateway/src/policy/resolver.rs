//! Policy resolution: find the policy governing (contract, resource), check
//! its integrity and validity window, then evaluate the caller's rules.
//!
//! Off-chain documents take precedence over on-chain policies (OCPs). Every
//! intermediate lookup is cached for the policy TTL:
//!
//! | key                         | value                                  |
//! |-----------------------------|----------------------------------------|
//! | `{contract}_{resource}`     | verified document body, or on-chain marker |
//! | `{contract}_ocp_{resource}` | the OCP record                         |
//! | `{contract}_ocp_{resource}_{param}` | one OCP parameter value        |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use ledgergate_core::error::{LedgerGateError, Result};
use ledgergate_core::hash::matches_pinned;

use super::document::PolicyDocument;
use super::evaluator::{check_rules, ValueSource};
use super::rules::PolicyRule;
use crate::cache::{self, Cache};
use crate::documents::PolicyStore;
use crate::ledger::{Ledger, Ocp};

/// What the resource key caches.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
enum CachedPolicy {
    OffChain { body: String },
    OnChain,
}

pub struct PolicyResolver {
    cache: Arc<dyn Cache>,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn PolicyStore>,
    ttl: Duration,
}

impl PolicyResolver {
    pub fn new(
        cache: Arc<dyn Cache>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn PolicyStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            ledger,
            store,
            ttl,
        }
    }

    pub async fn verify_policy(&self, contract: &str, resource: &str, rules: &[PolicyRule]) -> Result<()> {
        self.verify_policy_at(contract, resource, rules, Utc::now()).await
    }

    /// [`Self::verify_policy`] against an explicit "now".
    pub async fn verify_policy_at(
        &self,
        contract: &str,
        resource: &str,
        rules: &[PolicyRule],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key = cache::policy_key(contract, resource);

        let body = match cache::get_record::<CachedPolicy>(self.cache.as_ref(), &key).await? {
            Some(CachedPolicy::OffChain { body }) => body,
            Some(CachedPolicy::OnChain) => {
                return self.verify_ocp(contract, resource, rules, now, false).await;
            }
            None => {
                let pointers = self.ledger.policies(contract).await.map_err(|e| {
                    tracing::debug!(contract, error = %e, "policy list unavailable");
                    LedgerGateError::ContractNotFound(contract.to_string())
                })?;

                let Some(pointer) = pointers
                    .into_iter()
                    .find(|p| p.resource.eq_ignore_ascii_case(resource))
                else {
                    return self.verify_ocp(contract, resource, rules, now, true).await;
                };

                let raw = self.store.fetch(&pointer.location).await?;
                if !matches_pinned(&raw, &pointer.hash_code) {
                    tracing::warn!(contract, resource, location = %pointer.location, "policy body does not match pinned hash");
                    return Err(LedgerGateError::PolicyHashMismatch(resource.to_string()));
                }
                let body = String::from_utf8(raw).map_err(|_| {
                    LedgerGateError::Internal(format!("policy for {resource}: body is not UTF-8"))
                })?;

                let record = CachedPolicy::OffChain { body: body.clone() };
                cache::set_record(self.cache.as_ref(), &key, &record, self.ttl).await?;
                body
            }
        };

        let document = PolicyDocument::parse(resource, &body)?;
        check_window(resource, document.start_time, document.expiration, now)?;
        check_rules(resource, rules, &document).await
    }

    /// Verify against the resource's OCP. With `mark_on_chain`, a found OCP
    /// also records that the resource has no off-chain policy.
    async fn verify_ocp(
        &self,
        contract: &str,
        resource: &str,
        rules: &[PolicyRule],
        now: DateTime<Utc>,
        mark_on_chain: bool,
    ) -> Result<()> {
        let key = cache::ocp_key(contract, resource);

        let ocp = match cache::get_record::<Ocp>(self.cache.as_ref(), &key).await? {
            Some(ocp) => ocp,
            None => {
                let ocp = self
                    .ledger
                    .ocps(contract)
                    .await?
                    .into_iter()
                    .find(|o| o.resource.eq_ignore_ascii_case(resource))
                    .ok_or_else(|| LedgerGateError::PolicyNotFound(resource.to_string()))?;
                cache::set_record(self.cache.as_ref(), &key, &ocp, self.ttl).await?;
                ocp
            }
        };
        if mark_on_chain {
            let marker = cache::policy_key(contract, resource);
            cache::set_record(self.cache.as_ref(), &marker, &CachedPolicy::OnChain, self.ttl).await?;
        }

        check_window(resource, ocp.start_time, ocp.expiration, now)?;

        let values = OcpValues {
            resolver: self,
            contract,
            resource,
            ocp_id: ocp.id,
        };
        check_rules(resource, rules, &values).await
    }
}

/// Usable only while `start <= now <= expiration`.
pub fn check_window(
    resource: &str,
    start: DateTime<Utc>,
    expiration: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    if now < start {
        return Err(LedgerGateError::PolicyWindowNotStarted {
            resource: resource.to_string(),
            start: start.to_rfc3339(),
        });
    }
    if now > expiration {
        return Err(LedgerGateError::PolicyWindowExpired {
            resource: resource.to_string(),
            expiration: expiration.to_rfc3339(),
        });
    }
    Ok(())
}

/// OCP parameters, each cached on first read.
struct OcpValues<'a> {
    resolver: &'a PolicyResolver,
    contract: &'a str,
    resource: &'a str,
    ocp_id: u64,
}

impl OcpValues<'_> {
    async fn cached<T, F>(&self, name: &str, read: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Future<Output = Result<T>> + Send,
    {
        let cache = self.resolver.cache.as_ref();
        let key = cache::ocp_param_key(self.contract, self.resource, name);
        if let Some(v) = cache::get_record::<T>(cache, &key).await? {
            return Ok(v);
        }
        let v = read.await?;
        cache::set_record(cache, &key, &v, self.resolver.ttl).await?;
        Ok(v)
    }
}

#[async_trait]
impl<'a> ValueSource for OcpValues<'a> {
    async fn bool_value(&self, name: &str) -> Result<bool> {
        let ledger = self.resolver.ledger.as_ref();
        self.cached(name, ledger.ocp_bool_param(self.contract, self.ocp_id, name))
            .await
    }

    async fn int_value(&self, name: &str) -> Result<i64> {
        let ledger = self.resolver.ledger.as_ref();
        self.cached(name, ledger.ocp_int_param(self.contract, self.ocp_id, name))
            .await
    }

    async fn string_value(&self, name: &str) -> Result<String> {
        let ledger = self.resolver.ledger.as_ref();
        self.cached(name, ledger.ocp_string_param(self.contract, self.ocp_id, name))
            .await
    }
}
