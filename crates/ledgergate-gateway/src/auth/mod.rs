//! Token authentication against ledger-registered identities.

mod token_verifier;

pub use token_verifier::TokenVerifier;
