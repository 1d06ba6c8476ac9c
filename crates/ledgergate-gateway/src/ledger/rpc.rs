use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde_json::{json, Value};

use ledgergate_core::error::{LedgerGateError, Result};

use super::abi::{encode_call, Arg, Decoder};
use super::{ContractState, Ledger, Ocp, PolicyPointer};

/// Ethereum JSON-RPC (`eth_call`) implementation of [`Ledger`].
pub struct RpcLedger {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": id });

        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LedgerGateError::UpstreamUnavailable(format!("ledger rpc: {e}")))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| LedgerGateError::UpstreamUnavailable(format!("ledger rpc body: {e}")))?;

        if let Some(err) = body.get("error") {
            return Err(LedgerGateError::UpstreamUnavailable(format!(
                "ledger rpc {method} failed: {err}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| LedgerGateError::UpstreamUnavailable(format!("ledger rpc {method}: no result")))
    }

    /// `eth_call` a view function; empty output means there is no contract code.
    async fn view(&self, contract: &str, signature: &str, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        let data = format!("0x{}", hex::encode(encode_call(signature, args)));
        let result = self
            .rpc("eth_call", json!([{ "to": contract, "data": data }, "latest"]))
            .await?;

        let hex_out = result
            .as_str()
            .ok_or_else(|| LedgerGateError::UpstreamUnavailable("eth_call result is not a string".into()))?;
        let out = hex::decode(hex_out.trim_start_matches("0x"))
            .map_err(|e| LedgerGateError::UpstreamUnavailable(format!("eth_call result: {e}")))?;

        if out.is_empty() {
            return Err(LedgerGateError::ContractNotFound(contract.to_string()));
        }
        Ok(out)
    }

    async fn count(&self, contract: &str, signature: &str) -> Result<u64> {
        let out = self.view(contract, signature, &[]).await?;
        Decoder::new(&out).uint(0)
    }
}

fn unix_to_utc(secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .ok_or_else(|| LedgerGateError::UpstreamUnavailable(format!("timestamp out of range: {secs}")))
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn probe(&self) -> Result<()> {
        self.rpc("eth_chainId", json!([])).await.map(|_| ())
    }

    async fn contract(&self, address: &str) -> Result<ContractState> {
        let (owner, signer, initialized, signed) = tokio::try_join!(
            self.view(address, "owner()", &[]),
            self.view(address, "signer()", &[]),
            self.view(address, "initialized()", &[]),
            self.view(address, "signed()", &[]),
        )?;

        Ok(ContractState {
            address: address.to_string(),
            owner: Decoder::new(&owner).address(0)?,
            signer: Decoder::new(&signer).address(0)?,
            initialized: Decoder::new(&initialized).bool(0)?,
            signed: Decoder::new(&signed).bool(0)?,
        })
    }

    async fn admins(&self, address: &str) -> Result<Vec<String>> {
        let n = self.count(address, "adminsCount()").await?;
        try_join_all((0..n).map(|i| async move {
            let out = self.view(address, "admins(uint256)", &[Arg::Uint(i)]).await?;
            Decoder::new(&out).address(0)
        }))
        .await
    }

    async fn ocps(&self, address: &str) -> Result<Vec<Ocp>> {
        let n = self.count(address, "ocpsCount()").await?;
        try_join_all((0..n).map(|id| async move {
            let out = self.view(address, "ocps(uint256)", &[Arg::Uint(id)]).await?;
            let d = Decoder::new(&out);
            Ok::<_, LedgerGateError>(Ocp {
                id,
                resource: d.string(0)?,
                start_time: unix_to_utc(d.uint(1)?)?,
                expiration: unix_to_utc(d.uint(2)?)?,
            })
        }))
        .await
    }

    async fn ocp_bool_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<bool> {
        let out = self
            .view(address, "getOCPBoolParam(uint256,string)", &[Arg::Uint(ocp_id), Arg::Str(name)])
            .await?;
        Decoder::new(&out).bool(0)
    }

    async fn ocp_int_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<i64> {
        let out = self
            .view(address, "getOCPIntParam(uint256,string)", &[Arg::Uint(ocp_id), Arg::Str(name)])
            .await?;
        Decoder::new(&out).int(0)
    }

    async fn ocp_string_param(&self, address: &str, ocp_id: u64, name: &str) -> Result<String> {
        let out = self
            .view(address, "getOCPStringParam(uint256,string)", &[Arg::Uint(ocp_id), Arg::Str(name)])
            .await?;
        Decoder::new(&out).string(0)
    }

    async fn policies(&self, address: &str) -> Result<Vec<PolicyPointer>> {
        let n = self.count(address, "policiesCount()").await?;
        try_join_all((0..n).map(|id| async move {
            let out = self.view(address, "policies(uint256)", &[Arg::Uint(id)]).await?;
            let d = Decoder::new(&out);
            Ok::<_, LedgerGateError>(PolicyPointer {
                id,
                hash_code: d.bytes32(0)?,
                resource: d.string(1)?,
                location: d.string(2)?,
            })
        }))
        .await
    }
}
