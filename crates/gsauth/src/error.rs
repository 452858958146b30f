// Error taxonomy for the authentication engine
//
// Retry policy belongs to the caller: nothing in here is retried
// internally. Transport failures are the only retryable kind;
// everything else needs fresh credentials, a fresh code, or an
// investigation of server contract drift.

use grandslam_shared::auth::{CryptoError, SrpError};
use thiserror::Error;

/// Failures of the HTTP layer beneath the protocol.
/// Retryable per caller policy, unlike protocol-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A required field was missing or malformed in a response
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server selected a password scheme this client does not speak
    #[error("unsupported protocol flavor: {0}")]
    UnsupportedProtocolFlavor(String),

    /// The completion response demanded a second-factor method this
    /// client does not speak
    #[error("unsupported second factor method: {0}")]
    UnsupportedSecondFactorMethod(String),

    /// Explicit denial from the service (non-zero status code)
    #[error("server rejected request (ec={code}): {message}")]
    ServerRejected { code: i64, message: String },

    #[error(transparent)]
    Srp(#[from] SrpError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Malformed caller input, e.g. a non-numeric second-factor code
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AuthError {
    /// Transport failures may be retried; protocol-level failures may not
    /// be without fresh credentials or a fresh code.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Transport(_))
    }

    /// Proof mismatches indicate possible tampering and must abort the
    /// attempt without an automatic retry.
    pub fn is_security_event(&self) -> bool {
        matches!(self, AuthError::Srp(SrpError::ProofMismatch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_split() {
        assert!(AuthError::Transport(TransportError::Timeout(5000)).is_retryable());
        assert!(!AuthError::ServerRejected { code: 1, message: "locked".into() }.is_retryable());
        assert!(!AuthError::Srp(SrpError::ProofMismatch).is_retryable());
    }

    #[test]
    fn test_proof_mismatch_is_security_event() {
        assert!(AuthError::Srp(SrpError::ProofMismatch).is_security_event());
        assert!(!AuthError::InvalidInput("code".into()).is_security_event());
    }
}
