//! Shared error type across ledgergate crates.

use thiserror::Error;

/// Client-facing error classes (stable API).
///
/// Each class maps onto exactly one HTTP status; the realtime boundary sends
/// the string form inside its error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Malformed input.
    BadRequest,
    /// Token could not be authenticated.
    Unauthorized,
    /// Authenticated, but not entitled.
    Forbidden,
    /// Contract or policy does not exist.
    NotFound,
    /// Upstream or internal failure.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unauthorized => "UNAUTHORIZED",
            ClientCode::Forbidden => "FORBIDDEN",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status code for this class.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::BadRequest => 400,
            ClientCode::Unauthorized => 401,
            ClientCode::Forbidden => 403,
            ClientCode::NotFound => 404,
            ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, LedgerGateError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerGateError {
    #[error("missing Token header")]
    MissingToken,
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("the signature has expired")]
    TokenExpired,
    #[error("there is no valid access control contract at {0}")]
    ContractNotFound(String),
    #[error("invalid contract at {0}: the contract is not signed")]
    ContractNotSigned(String),
    #[error("invalid contract at {0}: unauthorized contract owner")]
    UnauthorizedOwner(String),
    #[error("invalid contract at {0}: the provided identity differs from the registered one")]
    IdentityMismatch(String),
    #[error("no off-chain or on-chain policy found for resource {0}")]
    PolicyNotFound(String),
    #[error("policy for resource '{resource}': the validity period will start on {start}")]
    PolicyWindowNotStarted { resource: String, start: String },
    #[error("policy for resource '{resource}': the validity period ended on {expiration}")]
    PolicyWindowExpired { resource: String, expiration: String },
    #[error("policy for resource '{0}': hashcode mismatch, the body of the policy might have been altered")]
    PolicyHashMismatch(String),
    #[error("rule on parameter '{parameter}' was not respected")]
    PolicyRuleViolation { resource: String, parameter: String },
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl LedgerGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            LedgerGateError::MalformedToken(_) | LedgerGateError::BadRequest(_) => {
                ClientCode::BadRequest
            }
            LedgerGateError::MissingToken
            | LedgerGateError::SignatureMismatch
            | LedgerGateError::TokenExpired => ClientCode::Unauthorized,
            LedgerGateError::ContractNotSigned(_)
            | LedgerGateError::UnauthorizedOwner(_)
            | LedgerGateError::IdentityMismatch(_)
            | LedgerGateError::PolicyWindowNotStarted { .. }
            | LedgerGateError::PolicyWindowExpired { .. }
            | LedgerGateError::PolicyHashMismatch(_)
            | LedgerGateError::PolicyRuleViolation { .. } => ClientCode::Forbidden,
            LedgerGateError::ContractNotFound(_) | LedgerGateError::PolicyNotFound(_) => {
                ClientCode::NotFound
            }
            LedgerGateError::UpstreamUnavailable(_)
            | LedgerGateError::UnsupportedVersion
            | LedgerGateError::Internal(_) => ClientCode::Internal,
        }
    }

    /// True for a rule that was evaluated and not respected.
    ///
    /// The realtime fan-out treats this case as "skip this peer" rather than
    /// as an error to report.
    pub fn is_rule_violation(&self) -> bool {
        matches!(self, LedgerGateError::PolicyRuleViolation { .. })
    }
}
