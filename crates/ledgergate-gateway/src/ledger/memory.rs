use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use ledgergate_core::error::{LedgerGateError, Result};

use super::{ContractState, Ledger, Ocp, PolicyPointer};

/// Typed OCP parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerParam {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone)]
struct ContractRecord {
    state: ContractState,
    admins: Vec<String>,
    ocps: Vec<Ocp>,
    params: HashMap<(u64, String), LedgerParam>,
    policies: Vec<PolicyPointer>,
}

/// In-process ledger for embedding and tests.
///
/// Addresses are matched case-insensitively. Unlike a Solidity mapping, an
/// unset or differently-typed parameter is an error rather than a zero value.
/// Every read is counted so callers can assert how often the ledger was hit.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    contracts: DashMap<String, ContractRecord>,
    reads: AtomicUsize,
    unreachable: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract (replacing any previous record at that address).
    pub fn deploy(&self, state: ContractState) {
        let key = state.address.to_ascii_lowercase();
        self.contracts.insert(
            key,
            ContractRecord {
                state,
                admins: Vec::new(),
                ocps: Vec::new(),
                params: HashMap::new(),
                policies: Vec::new(),
            },
        );
    }

    pub fn add_admin(&self, address: &str, admin: &str) {
        if let Some(mut c) = self.contracts.get_mut(&address.to_ascii_lowercase()) {
            c.admins.push(admin.to_string());
        }
    }

    /// Append an OCP and return its id.
    pub fn create_ocp(
        &self,
        address: &str,
        resource: &str,
        start_time: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Option<u64> {
        let mut c = self.contracts.get_mut(&address.to_ascii_lowercase())?;
        let id = c.ocps.len() as u64;
        c.ocps.push(Ocp {
            id,
            resource: resource.to_string(),
            start_time,
            expiration,
        });
        Some(id)
    }

    pub fn set_ocp_param(&self, address: &str, ocp_id: u64, name: &str, value: LedgerParam) {
        if let Some(mut c) = self.contracts.get_mut(&address.to_ascii_lowercase()) {
            c.params.insert((ocp_id, name.to_string()), value);
        }
    }

    /// Append an off-chain policy pointer and return its id.
    pub fn create_policy(
        &self,
        address: &str,
        hash_code: [u8; 32],
        resource: &str,
        location: &str,
    ) -> Option<u64> {
        let mut c = self.contracts.get_mut(&address.to_ascii_lowercase())?;
        let id = c.policies.len() as u64;
        c.policies.push(PolicyPointer {
            id,
            hash_code,
            resource: resource.to_string(),
            location: location.to_string(),
        });
        Some(id)
    }

    /// Simulate losing the ledger endpoint.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    /// Number of reads served (or refused) so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn read<T>(&self, address: &str, f: impl FnOnce(&ContractRecord) -> Result<T>) -> Result<T> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(LedgerGateError::UpstreamUnavailable("ledger unreachable".into()));
        }
        let c = self
            .contracts
            .get(&address.to_ascii_lowercase())
            .ok_or_else(|| LedgerGateError::ContractNotFound(address.to_string()))?;
        f(c.value())
    }

    fn param(&self, address: &str, ocp_id: u64, name: &str) -> Result<LedgerParam> {
        self.read(address, |c| {
            c.params
                .get(&(ocp_id, name.to_string()))
                .cloned()
                .ok_or_else(|| LedgerGateError::UpstreamUnavailable(format!("ocp {ocp_id} has no parameter {name}")))
        })
    }
}

fn type_mismatch(name: &str, want: &str) -> LedgerGateError {
    LedgerGateError::UpstreamUnavailable(format!("ocp parameter {name} is not a {want}"))
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn probe(&self) -> Result<()> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(LedgerGateError::UpstreamUnavailable("ledger unreachable".into()));
        }
        Ok(())
    }

    async fn contract(&self, address: &str) -> Result<ContractState> {
        self.read(address, |c| Ok(c.state.clone()))
    }

    async fn admins(&self, address: &str) -> Result<Vec<String>> {
        self.read(address, |c| Ok(c.admins.clone()))
    }

    async fn ocps(&self, address: &str) -> Result<Vec<Ocp>> {
        self.read(address, |c| Ok(c.ocps.clone()))
    }

    async fn ocp_bool_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<bool> {
        match self.param(address, ocp_id, name)? {
            LedgerParam::Bool(b) => Ok(b),
            _ => Err(type_mismatch(name, "bool")),
        }
    }

    async fn ocp_int_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<i64> {
        match self.param(address, ocp_id, name)? {
            LedgerParam::Int(i) => Ok(i),
            _ => Err(type_mismatch(name, "int")),
        }
    }

    async fn ocp_string_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<String> {
        match self.param(address, ocp_id, name)? {
            LedgerParam::Str(s) => Ok(s),
            _ => Err(type_mismatch(name, "string")),
        }
    }

    async fn policies(&self, address: &str) -> Result<Vec<PolicyPointer>> {
        self.read(address, |c| Ok(c.policies.clone()))
    }
}
