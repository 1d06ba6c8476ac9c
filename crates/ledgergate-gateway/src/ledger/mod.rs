//! Read-only access to the access-control contract on the ledger.
//!
//! The engine never writes to the ledger; deployment, admin management and
//! policy creation happen elsewhere. Everything here is a view call.

pub mod abi;
mod memory;
mod rpc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgergate_core::error::Result;

pub use memory::{LedgerParam, MemoryLedger};
pub use rpc::RpcLedger;

/// Contract-level flags and parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    pub address: String,
    pub owner: String,
    /// Identity registered for the data consumer.
    pub signer: String,
    pub initialized: bool,
    pub signed: bool,
}

/// On-chain policy: validity window plus named parameters stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ocp {
    pub id: u64,
    pub resource: String,
    pub start_time: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
}

/// Ledger record pinning an off-chain policy document by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyPointer {
    pub id: u64,
    pub hash_code: [u8; 32],
    pub resource: String,
    pub location: String,
}

/// Read surface of the access-control contract.
///
/// A contract that does not exist surfaces as `ContractNotFound`; transport
/// failures as `UpstreamUnavailable`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Cheap reachability check used by the startup retry loop.
    async fn probe(&self) -> Result<()>;

    async fn contract(&self, address: &str) -> Result<ContractState>;
    async fn admins(&self, address: &str) -> Result<Vec<String>>;
    async fn ocps(&self, address: &str) -> Result<Vec<Ocp>>;
    async fn ocp_bool_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<bool>;
    async fn ocp_int_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<i64>;
    async fn ocp_string_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<String>;
    async fn policies(&self, address: &str) -> Result<Vec<PolicyPointer>>;
}
