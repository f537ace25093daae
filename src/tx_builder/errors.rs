//! Error types for transaction construction and signing
//!
//! Every variant is final for the envelope that produced it: a transaction
//! that cannot be signed is reported as failed and never broadcast.

use thiserror::Error;

/// Errors raised while building or signing a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// Descriptor fails structural checks
    ///
    /// This includes:
    /// - Empty signer or receiver account
    /// - Empty action list
    /// - Function call without a method name
    #[error("Malformed transaction: {0}")]
    MalformedDescriptor(String),

    /// Descriptor names a public key that does not belong to the signer
    #[error("Key mismatch: transaction is for {expected}, signer holds {actual}")]
    KeyMismatch {
        /// Public key carried by the descriptor
        expected: String,
        /// Public key of the signing key
        actual: String,
    },

    /// Secret key material could not be decoded
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Canonical encoding of the transaction failed
    #[error("Encoding failed: {0}")]
    Encoding(String),
}

impl SigningError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedDescriptor(_) => "malformed",
            Self::KeyMismatch { .. } => "key_mismatch",
            Self::InvalidKey(_) => "invalid_key",
            Self::Encoding(_) => "encoding",
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor(reason.into())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(err: std::io::Error) -> Self {
        SigningError::Encoding(err.to_string())
    }
}
