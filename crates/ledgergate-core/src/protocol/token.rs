//! Signed access token: `contract|identity|unix_seconds|signature`.
//!
//! The signature is an Ethereum personal-message signature (secp256k1,
//! recoverable, 65 bytes `r || s || v`) over the literal text
//! `contract|identity|unix_seconds`. Verification recovers the signer address
//! and compares it with the identity field; the ledger lookup happens in the
//! gateway.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use crate::error::{LedgerGateError, Result};
use crate::hash::keccak256;

const FIELD_SEPARATOR: char = '|';
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// A parsed (not yet verified) token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub contract: String,
    pub identity: String,
    pub timestamp: u64,
    pub signature: String,
    // Kept verbatim so the signed message is rebuilt byte-for-byte.
    timestamp_raw: String,
}

impl Token {
    /// Split a wire token into its four fields.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(4, FIELD_SEPARATOR);
        let (Some(contract), Some(identity), Some(timestamp_raw), Some(signature)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(LedgerGateError::MalformedToken("expected 4 '|'-separated fields".into()));
        };

        if [contract, identity, timestamp_raw, signature].iter().any(|f| f.is_empty()) {
            return Err(LedgerGateError::MalformedToken("empty field".into()));
        }

        let timestamp = timestamp_raw
            .parse::<u64>()
            .map_err(|e| LedgerGateError::MalformedToken(format!("invalid timestamp: {e}")))?;

        Ok(Self {
            contract: contract.to_string(),
            identity: identity.to_string(),
            timestamp,
            signature: signature.to_string(),
            timestamp_raw: timestamp_raw.to_string(),
        })
    }

    /// The exact text covered by the signature.
    pub fn signed_message(&self) -> String {
        format!("{}|{}|{}", self.contract, self.identity, self.timestamp_raw)
    }

    /// Recover the address that produced `signature` over [`Self::signed_message`].
    pub fn recover_signer(&self) -> Result<String> {
        recover_identity(&self.signed_message(), &self.signature)
    }

    /// Build a signed wire token for `contract`, identifying as the key's address.
    pub fn sign(contract: &str, key: &SigningKey, timestamp: u64) -> Result<String> {
        let identity = identity_address(key.verifying_key());
        let message = format!("{contract}|{identity}|{timestamp}");
        let signature = sign_personal_message(&message, key)?;
        Ok(format!("{message}|{signature}"))
    }
}

/// `0x`-prefixed lowercase address of a secp256k1 public key.
pub fn identity_address(key: &VerifyingKey) -> String {
    let point = PublicKey::from(key).to_encoded_point(false);
    // Uncompressed SEC1: 0x04 || X || Y. The address is the tail of keccak(X || Y).
    let digest = keccak256(point.as_bytes().get(1..).unwrap_or_default());
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Recover the signer address of an Ethereum personal-message signature.
pub fn recover_identity(message: &str, signature_hex: &str) -> Result<String> {
    let bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| LedgerGateError::SignatureMismatch)?;
    if bytes.len() != 65 {
        return Err(LedgerGateError::SignatureMismatch);
    }

    let v = match bytes[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        _ => return Err(LedgerGateError::SignatureMismatch),
    };
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(LedgerGateError::SignatureMismatch)?;
    let mut signature =
        Signature::from_slice(&bytes[..64]).map_err(|_| LedgerGateError::SignatureMismatch)?;

    // High-S signatures recover the same key with the opposite y parity.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let prehash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recovery_id)
        .map_err(|_| LedgerGateError::SignatureMismatch)?;

    Ok(identity_address(&key))
}

/// Sign `message` the way wallets do for `personal_sign`; returns `0x` hex.
pub fn sign_personal_message(message: &str, key: &SigningKey) -> Result<String> {
    let prehash = personal_message_hash(message);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&prehash)
        .map_err(|e| LedgerGateError::Internal(format!("signing failed: {e}")))?;

    let mut out = signature.to_bytes().to_vec();
    out.push(27 + recovery_id.to_byte());
    Ok(format!("0x{}", hex::encode(out)))
}

fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut framed = format!("{PERSONAL_MESSAGE_PREFIX}{}", message.len()).into_bytes();
    framed.extend_from_slice(message.as_bytes());
    keccak256(&framed)
}
