//! RPC Manager Module
//!
//! Network access for the dispatch engine, behind the `RpcTransport` trait so
//! the engine can be driven by a scripted transport in tests.

use async_trait::async_trait;

use crate::tx_builder::SignedTransaction;
use crate::types::{AccessKeyView, ConfirmedTx, PublicKey, TxHash};

// Submodules
pub mod rpc_client;
pub mod rpc_errors;

// Re-exports for convenience
pub use rpc_client::JsonRpcTransport;
pub use rpc_errors::{RpcError, RpcResult};

/// Trait for the three network calls the dispatch engine makes
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Current nonce of the access key plus a recent block hash
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &PublicKey,
    ) -> RpcResult<AccessKeyView>;

    /// Hand the transaction to the node without waiting for execution
    async fn broadcast_tx_async(&self, tx: &SignedTransaction) -> RpcResult<TxHash>;

    /// Final execution outcome; `RpcError::UnknownTransaction` while the
    /// node has not seen the hash
    async fn tx_status(&self, hash: &TxHash, sender_id: &str) -> RpcResult<ConfirmedTx>;
}
