use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use ledgergate_core::error::{LedgerGateError, Result};

use crate::policy::checks::{BoolCheck, IntCheck, ListCheck, StringCheck};

/// Longest TTL or delay accepted anywhere in the config: 30 days.
const MAX_SECS: u64 = 30 * 24 * 3600;
const MAX_MILLIS: u64 = MAX_SECS * 1000;

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(LedgerGateError::BadRequest(format!(
        "{field} must be between {min} and {max}"
    )))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub security: SecuritySection,

    #[serde(default)]
    pub caching: CachingSection,

    pub ledger: LedgerSection,

    #[serde(default)]
    pub realtime: RealtimeSection,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(LedgerGateError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.security.validate()?;
        self.caching.validate()?;
        self.ledger.validate()?;
        self.realtime.validate()?;

        let mut seen = HashSet::new();
        for r in &self.resources {
            if !seen.insert(r.name.to_ascii_lowercase()) {
                return Err(LedgerGateError::BadRequest(format!(
                    "resources: duplicate resource {}",
                    r.name
                )));
            }
            for c in &r.checks {
                c.validate(&r.name)?;
            }
        }

        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            poll_interval_ms: default_poll_interval_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.poll_interval_ms) {
            return Err(LedgerGateError::BadRequest(
                "gateway.poll_interval_ms must be between 1 and 1000".into(),
            ));
        }
        if !(100..=60000).contains(&self.handshake_timeout_ms) {
            return Err(LedgerGateError::BadRequest(
                "gateway.handshake_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_poll_interval_ms() -> u64 {
    15
}
fn default_handshake_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    #[serde(default = "default_validity_secs")]
    pub token_validity_secs: u64,

    /// Contract owners trusted to issue policies. Empty means any owner.
    #[serde(default)]
    pub authorized_owners: Vec<String>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            token_validity_secs: default_validity_secs(),
            authorized_owners: Vec::new(),
        }
    }
}

impl SecuritySection {
    pub fn validate(&self) -> Result<()> {
        check_range("security.token_validity_secs", self.token_validity_secs, 1, MAX_SECS)?;
        if self.authorized_owners.iter().any(|o| o.trim().is_empty()) {
            return Err(LedgerGateError::BadRequest(
                "security.authorized_owners must not contain empty entries".into(),
            ));
        }
        Ok(())
    }

    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.token_validity_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CachingSection {
    #[serde(default = "default_validity_secs")]
    pub policy_ttl_secs: u64,

    /// How often expired entries are swept from the cache.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for CachingSection {
    fn default() -> Self {
        Self {
            policy_ttl_secs: default_validity_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl CachingSection {
    pub fn validate(&self) -> Result<()> {
        check_range("caching.policy_ttl_secs", self.policy_ttl_secs, 1, MAX_SECS)?;
        check_range("caching.purge_interval_secs", self.purge_interval_secs, 1, 86400)
    }

    pub fn policy_ttl(&self) -> Duration {
        Duration::from_secs(self.policy_ttl_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

fn default_validity_secs() -> u64 {
    3600
}
fn default_purge_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSection {
    pub rpc_url: String,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl LedgerSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(LedgerGateError::BadRequest(
                "ledger.rpc_url must be an http(s) url".into(),
            ));
        }
        check_range("ledger.retry_delay_ms", self.retry_delay_ms, 1, MAX_MILLIS)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_retry_delay_ms() -> u64 {
    5000
}

/// How readings are handed to a peer's outbound queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Await queue space (bounded by `send_timeout_ms`).
    #[default]
    Reliable,
    /// Drop the reading when the peer's queue is full.
    Lossy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeSection {
    #[serde(default)]
    pub delivery: DeliveryMode,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    #[serde(default = "default_streams")]
    pub streams: Vec<StreamConfig>,

    /// Policy parameter holding the comma-separated device allow-list.
    #[serde(default = "default_device_param")]
    pub device_param: String,

    #[serde(default = "default_retry_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::default(),
            send_timeout_ms: default_send_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            streams: default_streams(),
            device_param: default_device_param(),
            reconnect_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RealtimeSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=256 * 1024).contains(&self.outbound_queue) {
            return Err(LedgerGateError::BadRequest(
                "realtime.outbound_queue must be between 1 and 262144".into(),
            ));
        }
        if self.device_param.is_empty() {
            return Err(LedgerGateError::BadRequest(
                "realtime.device_param must not be empty".into(),
            ));
        }
        check_range("realtime.reconnect_delay_ms", self.reconnect_delay_ms, 1, MAX_MILLIS)?;
        check_range("realtime.send_timeout_ms", self.send_timeout_ms, 0, MAX_MILLIS)?;
        let mut queues = HashSet::new();
        for s in &self.streams {
            if s.queue.is_empty() || s.resource.is_empty() {
                return Err(LedgerGateError::BadRequest(
                    "realtime.streams entries need both queue and resource".into(),
                ));
            }
            if !queues.insert(s.queue.as_str()) {
                return Err(LedgerGateError::BadRequest(format!(
                    "realtime.streams: duplicate queue {}",
                    s.queue
                )));
            }
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Resource fed by `queue`, if the queue is subscribed.
    pub fn resource_for(&self, queue: &str) -> Option<&str> {
        self.streams
            .iter()
            .find(|s| s.queue == queue)
            .map(|s| s.resource.as_str())
    }
}

fn default_send_timeout_ms() -> u64 {
    1500
}
fn default_outbound_queue() -> usize {
    256
}
fn default_device_param() -> String {
    "devices".into()
}
fn default_streams() -> Vec<StreamConfig> {
    vec![
        StreamConfig { queue: "temperatureRT".into(), resource: "temperature".into() },
        StreamConfig { queue: "humidityRT".into(), resource: "humidity".into() },
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub queue: String,
    pub resource: String,
}

/// A resource served over HTTP and the request checks guarding it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

/// One query-parameter check; exactly one condition kind must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    /// Query-string parameter supplying the requested value.
    pub query: String,
    /// Policy parameter it is compared against (defaults to `query`).
    #[serde(default)]
    pub policy: Option<String>,

    #[serde(default)]
    pub bool: Option<BoolCheck>,
    #[serde(default)]
    pub int: Option<IntCheck>,
    #[serde(default)]
    pub string: Option<StringCheck>,
    #[serde(default)]
    pub list: Option<ListCheck>,
}

impl CheckConfig {
    pub fn validate(&self, resource: &str) -> Result<()> {
        let kinds = [
            self.bool.is_some(),
            self.int.is_some(),
            self.string.is_some(),
            self.list.is_some(),
        ];
        if kinds.iter().filter(|k| **k).count() != 1 {
            return Err(LedgerGateError::BadRequest(format!(
                "resources.{resource}: check on '{}' must set exactly one of bool/int/string/list",
                self.query
            )));
        }
        if self.query.is_empty() {
            return Err(LedgerGateError::BadRequest(format!(
                "resources.{resource}: check query must not be empty"
            )));
        }
        Ok(())
    }

    pub fn policy_param(&self) -> &str {
        self.policy.as_deref().unwrap_or(&self.query)
    }
}
