//! Token authentication: signature and freshness, then the contract's
//! identity and standing on the ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use ledgergate_core::error::{LedgerGateError, Result};
use ledgergate_core::protocol::token::Token;

use crate::cache::{self, Cache};
use crate::ledger::Ledger;

/// Authenticates signed tokens and resolves the contract they act for.
pub struct TokenVerifier {
    cache: Arc<dyn Cache>,
    ledger: Arc<dyn Ledger>,
    token_validity: Duration,
    authorized_owners: Vec<String>,
}

impl TokenVerifier {
    pub fn new(
        cache: Arc<dyn Cache>,
        ledger: Arc<dyn Ledger>,
        token_validity: Duration,
        authorized_owners: Vec<String>,
    ) -> Self {
        Self {
            cache,
            ledger,
            token_validity,
            authorized_owners,
        }
    }

    pub fn token_validity(&self) -> Duration {
        self.token_validity
    }

    /// Verify `raw` and return the contract address it grants access through.
    pub async fn verify_token(&self, raw: &str) -> Result<String> {
        self.verify_token_at(raw, Utc::now()).await
    }

    /// [`Self::verify_token`] against an explicit "now".
    pub async fn verify_token_at(&self, raw: &str, now: DateTime<Utc>) -> Result<String> {
        let token = Token::parse(raw)?;

        let recovered = token.recover_signer()?;
        if !recovered.eq_ignore_ascii_case(&token.identity) {
            return Err(LedgerGateError::SignatureMismatch);
        }

        // Only past skew is bounded; a timestamp ahead of `now` is accepted.
        let issued = i64::try_from(token.timestamp)
            .ok()
            .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
            .ok_or_else(|| LedgerGateError::MalformedToken("timestamp out of range".into()))?;
        let validity = chrono::Duration::from_std(self.token_validity)
            .map_err(|e| LedgerGateError::Internal(format!("token validity out of range: {e}")))?;
        if now - issued > validity {
            return Err(LedgerGateError::TokenExpired);
        }

        let registered = self.registered_identity(&token.contract).await?;
        if !registered.eq_ignore_ascii_case(&token.identity) {
            return Err(LedgerGateError::IdentityMismatch(token.contract));
        }

        Ok(token.contract)
    }

    async fn registered_identity(&self, contract: &str) -> Result<String> {
        let key = cache::contract_key(contract);
        if let Some(identity) = cache::get_record::<String>(self.cache.as_ref(), &key).await? {
            return Ok(identity);
        }

        let state = self.ledger.contract(contract).await.map_err(|e| {
            tracing::debug!(contract, error = %e, "contract lookup failed");
            LedgerGateError::ContractNotFound(contract.to_string())
        })?;

        if !state.signed {
            return Err(LedgerGateError::ContractNotSigned(contract.to_string()));
        }

        if !self.authorized_owners.is_empty()
            && !self
                .authorized_owners
                .iter()
                .any(|o| o.eq_ignore_ascii_case(&state.owner))
        {
            return Err(LedgerGateError::UnauthorizedOwner(contract.to_string()));
        }

        cache::set_record(self.cache.as_ref(), &key, &state.signer, self.token_validity).await?;
        Ok(state.signer)
    }
}
