//! Test Utilities Module
//!
//! Deterministic stand-ins for the network and the signer so the dispatch
//! engine can be exercised without a node.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::rpc_manager::{RpcError, RpcResult, RpcTransport};
use crate::tx_builder::{SignedTransaction, SigningError, TxDescriptor, TxEnvelope, TxSigner};
use crate::types::{AccessKeyView, Action, ConfirmedTx, CryptoHash, PublicKey, TxHash};

const MOCK_ENDPOINT: &str = "mock://rpc";

/// One scripted answer to a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReply {
    Confirmed,
    NotFound,
    Error,
}

/// A broadcast the transport accepted
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub hash: TxHash,
    pub signer_id: String,
    pub nonce: u64,
    pub at: Instant,
}

#[derive(Default)]
struct ScriptState {
    access_keys: HashMap<String, AccessKeyView>,
    failing_access_keys: HashSet<String>,
    failing_broadcast_nonces: HashSet<u64>,
    by_hash: HashMap<TxHash, VecDeque<StatusReply>>,
    by_nonce: HashMap<u64, VecDeque<StatusReply>>,
    broadcasts: Vec<BroadcastRecord>,
}

/// Scripted in-memory `RpcTransport`
///
/// Status answers are scripted per hash, or per nonce for transactions whose
/// hash is only known after signing. Once a script runs out, the default
/// reply is returned (NotFound unless changed).
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
    default_reply: Mutex<StatusReply>,
    status_delay: Mutex<Duration>,
    status_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState::default()),
            default_reply: Mutex::new(StatusReply::NotFound),
            status_delay: Mutex::new(Duration::ZERO),
            status_calls: AtomicUsize::new(0),
        }
    }

    /// Access key view returned for `account_id` (default nonce 0)
    pub fn set_access_key(&self, account_id: &str, nonce: u64) {
        self.state.lock().access_keys.insert(
            account_id.to_string(),
            AccessKeyView {
                nonce,
                block_hash: CryptoHash([7; 32]),
            },
        );
    }

    pub fn fail_access_key(&self, account_id: &str) {
        self.state
            .lock()
            .failing_access_keys
            .insert(account_id.to_string());
    }

    /// Reject the broadcast of the transaction carrying `nonce`
    pub fn fail_broadcast(&self, nonce: u64) {
        self.state.lock().failing_broadcast_nonces.insert(nonce);
    }

    pub fn script_status(&self, hash: TxHash, replies: Vec<StatusReply>) {
        self.state.lock().by_hash.insert(hash, replies.into());
    }

    pub fn script_nonce(&self, nonce: u64, replies: Vec<StatusReply>) {
        self.state.lock().by_nonce.insert(nonce, replies.into());
    }

    pub fn set_default_reply(&self, reply: StatusReply) {
        *self.default_reply.lock() = reply;
    }

    /// Every status query takes this long before answering
    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock() = delay;
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.state.lock().broadcasts.clone()
    }

    fn next_reply(&self, hash: &TxHash) -> StatusReply {
        let mut state = self.state.lock();
        state
            .by_hash
            .get_mut(hash)
            .and_then(VecDeque::pop_front)
            .unwrap_or(*self.default_reply.lock())
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn view_access_key(
        &self,
        account_id: &str,
        _public_key: &PublicKey,
    ) -> RpcResult<AccessKeyView> {
        let state = self.state.lock();
        if state.failing_access_keys.contains(account_id) {
            return Err(RpcError::RpcResponse {
                endpoint: MOCK_ENDPOINT.to_string(),
                code: Some(-32000),
                name: Some("HANDLER_ERROR".to_string()),
                cause: Some("UNKNOWN_ACCESS_KEY".to_string()),
                message: format!("access key of {} does not exist", account_id),
            });
        }
        Ok(state
            .access_keys
            .get(account_id)
            .copied()
            .unwrap_or(AccessKeyView {
                nonce: 0,
                block_hash: CryptoHash([7; 32]),
            }))
    }

    async fn broadcast_tx_async(&self, tx: &SignedTransaction) -> RpcResult<TxHash> {
        let mut state = self.state.lock();
        let nonce = tx.descriptor.nonce;
        if state.failing_broadcast_nonces.contains(&nonce) {
            return Err(RpcError::Transport {
                endpoint: MOCK_ENDPOINT.to_string(),
                message: "connection reset by peer".to_string(),
            });
        }

        let hash = tx.hash();
        if let Some(replies) = state.by_nonce.remove(&nonce) {
            state.by_hash.insert(hash, replies);
        }
        state.broadcasts.push(BroadcastRecord {
            hash,
            signer_id: tx.descriptor.signer_id.clone(),
            nonce,
            at: Instant::now(),
        });
        Ok(hash)
    }

    async fn tx_status(&self, hash: &TxHash, _sender_id: &str) -> RpcResult<ConfirmedTx> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.status_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(hash) {
            StatusReply::Confirmed => Ok(ConfirmedTx {
                status: serde_json::json!({ "SuccessValue": "" }),
                hash: hash.to_string(),
                block_hash: CryptoHash([9; 32]).to_string(),
            }),
            StatusReply::NotFound => Err(RpcError::UnknownTransaction {
                endpoint: MOCK_ENDPOINT.to_string(),
                hash: hash.to_string(),
            }),
            StatusReply::Error => Err(RpcError::RpcResponse {
                endpoint: MOCK_ENDPOINT.to_string(),
                code: Some(-32000),
                name: Some("HANDLER_ERROR".to_string()),
                cause: Some("INTERNAL_ERROR".to_string()),
                message: "Server error".to_string(),
            }),
        }
    }
}

/// Signer that refuses every descriptor
pub struct FailingSigner;

#[async_trait]
impl TxSigner for FailingSigner {
    fn public_key(&self) -> PublicKey {
        PublicKey([1; 32])
    }

    async fn sign(&self, _descriptor: &TxDescriptor) -> Result<SignedTransaction, SigningError> {
        Err(SigningError::InvalidKey("hardware signer unavailable".to_string()))
    }
}

/// Descriptor with placeholder accounts, for envelopes built by hand
pub fn descriptor(nonce: u64) -> TxDescriptor {
    TxDescriptor {
        signer_id: "u0.factory.testnet".to_string(),
        public_key: PublicKey([1; 32]),
        nonce,
        receiver_id: "counter.factory.testnet".to_string(),
        block_hash: CryptoHash([7; 32]),
        actions: vec![Action::Transfer { deposit: 1 }],
    }
}

/// Envelope that was never broadcast
pub fn envelope(sender_index: usize, offset: u64) -> TxEnvelope {
    TxEnvelope::new(descriptor(offset), sender_index, offset)
}

/// Envelope as it looks after a successful broadcast
pub fn envelope_with_hash(sender_index: usize, offset: u64, hash: TxHash) -> TxEnvelope {
    let mut envelope = envelope(sender_index, offset);
    envelope.record_broadcast(hash);
    envelope
}
