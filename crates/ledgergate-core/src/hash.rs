//! Content digest used to pin off-chain policy bodies to their ledger record.

use sha3::{Digest, Keccak256};

/// Keccak-256 of `bytes` (legacy padding, identical to Solidity's `keccak256`).
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// True when `body` hashes to the 32-byte code published on the ledger.
pub fn matches_pinned(body: &[u8], pinned: &[u8; 32]) -> bool {
    keccak256(body) == *pinned
}
