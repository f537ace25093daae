//! Error taxonomy of the dispatch engine
//!
//! Every per-envelope error ends up as a `TxOutcome::Failed` entry in the
//! sender's report. Only the not-found status query is ever retried, and that
//! retry is owned by the confirmation resolver.

use thiserror::Error;

use crate::rpc_manager::RpcError;
use crate::tx_builder::SigningError;

/// Errors produced while dispatching or resolving a transaction
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Descriptor could not be signed; nothing was broadcast
    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    /// Broadcast was rejected or never reached the node. Never re-sent,
    /// since the transaction may already sit in the node's backlog.
    #[error("Broadcast failed: {0}")]
    Submit(#[source] RpcError),

    /// Status query failed with something other than "not found"
    #[error("Status query failed: {0}")]
    Query(#[source] RpcError),

    /// Starting nonce could not be fetched; the sender never started
    #[error("Access key lookup failed for {account}: {source}")]
    AccessKey {
        account: String,
        #[source]
        source: RpcError,
    },

    /// Resolution was requested for an envelope without a hash
    #[error("Transaction was never broadcast")]
    NotBroadcast,

    /// Confirmation task panicked or another invariant broke
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Endpoint that produced the underlying RPC error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Submit(err) | Self::Query(err) => err.endpoint(),
            Self::AccessKey { source, .. } => source.endpoint(),
            _ => None,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Signing(_) => "signing",
            Self::Submit(_) => "submit",
            Self::Query(_) => "query",
            Self::AccessKey { .. } => "access_key",
            Self::NotBroadcast => "not_broadcast",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error() -> RpcError {
        RpcError::Transport {
            endpoint: "http://rpc".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_endpoint_comes_from_rpc_errors_only() {
        assert_eq!(DispatchError::Submit(transport_error()).endpoint(), Some("http://rpc"));
        assert_eq!(DispatchError::Query(transport_error()).endpoint(), Some("http://rpc"));
        let access = DispatchError::AccessKey {
            account: "u0".to_string(),
            source: transport_error(),
        };
        assert_eq!(access.endpoint(), Some("http://rpc"));
        assert_eq!(DispatchError::Signing(SigningError::malformed("x")).endpoint(), None);
        assert_eq!(DispatchError::NotBroadcast.endpoint(), None);
    }

    #[test]
    fn test_signing_error_conversion() {
        let err: DispatchError = SigningError::InvalidKey("bad".to_string()).into();
        assert!(matches!(err, DispatchError::Signing(_)));
        assert_eq!(err.category(), "signing");
        assert_eq!(err.to_string(), "Signing failed: Invalid key: bad");
    }

    #[test]
    fn test_access_key_display() {
        let err = DispatchError::AccessKey {
            account: "u0.factory.testnet".to_string(),
            source: transport_error(),
        };
        assert!(err.to_string().contains("u0.factory.testnet"));
        assert!(err.to_string().contains("connection refused"));
    }
}
