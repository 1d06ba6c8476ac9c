//! Shared fixtures: an in-process ledger, document store and cache, plus
//! deterministic signing keys.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k256::ecdsa::SigningKey;

use ledgergate_core::hash::keccak256;
use ledgergate_core::protocol::token::{identity_address, Token};
use ledgergate_gateway::app_state::Backends;
use ledgergate_gateway::auth::TokenVerifier;
use ledgergate_gateway::cache::MemoryCache;
use ledgergate_gateway::config::{self, GatewayConfig};
use ledgergate_gateway::documents::MemoryPolicyStore;
use ledgergate_gateway::ledger::{ContractState, LedgerParam, MemoryLedger};
use ledgergate_gateway::policy::PolicyResolver;

pub const CONTRACT_A: &str = "0x00000000000000000000000000000000000000a1";
pub const CONTRACT_B: &str = "0x00000000000000000000000000000000000000b2";
pub const HOUR: Duration = Duration::from_secs(3600);

pub const CONFIG: &str = r#"
version: 1
gateway:
  poll_interval_ms: 5
ledger:
  rpc_url: "http://127.0.0.1:8545"
realtime:
  reconnect_delay_ms: 20
resources:
  - name: temperature
    checks:
      - { query: count, policy: max_items, int: less_or_equal }
      - { query: deviceNames, policy: devices, list: all_contained_in }
"#;

pub fn config() -> GatewayConfig {
    config::load_from_str(CONFIG).unwrap()
}

pub fn key(byte: u8) -> SigningKey {
    let mut secret = [0u8; 32];
    secret[31] = byte;
    SigningKey::from_slice(&secret).unwrap()
}

pub fn token(contract: &str, key: &SigningKey) -> String {
    Token::sign(contract, key, Utc::now().timestamp() as u64).unwrap()
}

/// An off-chain policy body valid from an hour ago to an hour from now.
pub fn policy_body(fields: &str) -> String {
    let now = Utc::now();
    let hour = chrono::Duration::hours(1);
    format!(
        r#"{{"start_time":"{}","expiration":"{}",{fields}}}"#,
        (now - hour).to_rfc3339(),
        (now + hour).to_rfc3339()
    )
}

pub struct Fixture {
    pub ledger: Arc<MemoryLedger>,
    pub store: Arc<MemoryPolicyStore>,
    pub cache: Arc<MemoryCache>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
            store: Arc::new(MemoryPolicyStore::new()),
            cache: Arc::new(MemoryCache::new()),
        }
    }

    /// Deploy a signed contract whose registered identity is `signer`.
    pub fn deploy(&self, contract: &str, signer: &SigningKey) {
        self.ledger.deploy(ContractState {
            address: contract.into(),
            owner: "0x00000000000000000000000000000000000000ee".into(),
            signer: identity_address(signer.verifying_key()),
            initialized: true,
            signed: true,
        });
    }

    /// Pin `body` on the ledger and host it in the document store.
    pub fn publish_policy(&self, contract: &str, resource: &str, body: &str) -> String {
        let location = format!("https://policies.example/{contract}/{resource}.json");
        self.store.put(&location, body.as_bytes().to_vec());
        self.ledger
            .create_policy(contract, keccak256(body.as_bytes()), resource, &location)
            .unwrap();
        location
    }

    pub fn create_ocp(
        &self,
        contract: &str,
        resource: &str,
        start: DateTime<Utc>,
        expiration: DateTime<Utc>,
        params: &[(&str, LedgerParam)],
    ) -> u64 {
        let id = self.ledger.create_ocp(contract, resource, start, expiration).unwrap();
        for (name, value) in params {
            self.ledger.set_ocp_param(contract, id, name, value.clone());
        }
        id
    }

    pub fn resolver(&self) -> PolicyResolver {
        PolicyResolver::new(self.cache.clone(), self.ledger.clone(), self.store.clone(), HOUR)
    }

    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(self.cache.clone(), self.ledger.clone(), HOUR, Vec::new())
    }

    pub fn backends(&self) -> Backends {
        Backends {
            ledger: self.ledger.clone(),
            store: self.store.clone(),
            cache: self.cache.clone(),
        }
    }
}
