//! Core types shared across the dispatch engine

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;

use crate::dispatch::DispatchError;

/// Account identifier on the network (e.g. `u0.factory.testnet`)
pub type AccountId = String;

/// 32-byte hash, displayed as base58 like the network's RPC does.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, BorshSerialize)]
pub struct CryptoHash(pub [u8; 32]);

/// Transaction identifier returned by a broadcast
pub type TxHash = CryptoHash;

/// Recent block hash used as the validity anchor of a transaction
pub type BlockHash = CryptoHash;

impl CryptoHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for CryptoHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| format!("invalid base58 hash '{}': {}", s, e))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("invalid hash length: expected 32 bytes, got {}", v.len()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoHash({})", self)
    }
}

/// Ed25519 public key, rendered as `ed25519:<base58>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

const ED25519_PREFIX: &str = "ed25519:";

/// Key-type byte the network puts in front of ed25519 keys and signatures
pub const ED25519_KEY_TYPE: u8 = 0;

impl FromStr for PublicKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s.strip_prefix(ED25519_PREFIX).unwrap_or(s);
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| format!("invalid base58 public key: {}", e))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            format!("invalid public key length: expected 32 bytes, got {}", v.len())
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ED25519_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl BorshSerialize for PublicKey {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        BorshSerialize::serialize(&ED25519_KEY_TYPE, writer)?;
        BorshSerialize::serialize(&self.0, writer)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

/// Action carried by a transaction. All transactions of a run carry the
/// same action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Call a contract method
    FunctionCall {
        method_name: String,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    },
    /// Plain token transfer
    Transfer { deposit: u128 },
}

// Variant tags of the network's action enum
const FUNCTION_CALL_TAG: u8 = 2;
const TRANSFER_TAG: u8 = 3;

impl BorshSerialize for Action {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Action::FunctionCall {
                method_name,
                args,
                gas,
                deposit,
            } => {
                BorshSerialize::serialize(&FUNCTION_CALL_TAG, writer)?;
                BorshSerialize::serialize(method_name, writer)?;
                BorshSerialize::serialize(args, writer)?;
                BorshSerialize::serialize(gas, writer)?;
                BorshSerialize::serialize(deposit, writer)
            }
            Action::Transfer { deposit } => {
                BorshSerialize::serialize(&TRANSFER_TAG, writer)?;
                BorshSerialize::serialize(deposit, writer)
            }
        }
    }
}

impl Action {
    /// Function call with JSON arguments and no attached deposit
    pub fn function_call(method_name: impl Into<String>, args: &serde_json::Value, gas: u64) -> Self {
        Action::FunctionCall {
            method_name: method_name.into(),
            args: args.to_string().into_bytes(),
            gas,
            deposit: 0,
        }
    }
}

/// Access key state as reported by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessKeyView {
    /// Last nonce the network executed for this key
    pub nonce: u64,
    /// Block the view was taken at; doubles as the recent-anchor reference
    pub block_hash: BlockHash,
}

/// Execution result of a confirmed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedTx {
    /// Raw execution status (`SuccessValue`, `Failure`, ...)
    pub status: serde_json::Value,
    /// Final transaction hash as reported by the network
    pub hash: String,
    /// Block in which the transaction was included
    pub block_hash: String,
}

/// Terminal classification of one envelope
#[derive(Debug)]
pub enum TxOutcome {
    /// Network executed the transaction
    Confirmed(ConfirmedTx),
    /// A later offset from the same sender already executed, so this one never will
    Superseded { trials: u32 },
    /// Trial budget exhausted without proof either way; may still execute
    Ambiguous { trials: u32 },
    /// Signing, broadcast or an unrecoverable status query failed
    Failed(DispatchError),
}

impl TxOutcome {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            TxOutcome::Confirmed(_) => "confirmed",
            TxOutcome::Superseded { .. } => "superseded",
            TxOutcome::Ambiguous { .. } => "ambiguous",
            TxOutcome::Failed(_) => "failed",
        }
    }

    /// Whether the caller has to look at this transaction
    pub fn needs_attention(&self) -> bool {
        matches!(self, TxOutcome::Ambiguous { .. } | TxOutcome::Failed(_))
    }
}

/// Why a transaction ended up in a sender's failure list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedKind {
    /// Might still execute later
    Ambiguous,
    /// Definitely not executed through this client
    Failed(String),
}

/// A transaction the sender could not confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTx {
    pub offset: u64,
    pub nonce: u64,
    pub hash: Option<TxHash>,
    pub kind: UnresolvedKind,
}

/// Result of one sender's run
#[derive(Debug, Clone, Default)]
pub struct SenderReport {
    pub account_id: AccountId,
    pub nickname: String,
    pub confirmed: u64,
    pub superseded: u64,
    pub unresolved: Vec<UnresolvedTx>,
    /// Set when the sender could not even start (e.g. access key lookup failed)
    pub setup_error: Option<String>,
}

impl SenderReport {
    pub fn new(account_id: impl Into<AccountId>, nickname: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            nickname: nickname.into(),
            ..Default::default()
        }
    }

    /// Fold one terminal outcome into the tallies
    pub fn record(&mut self, offset: u64, nonce: u64, hash: Option<TxHash>, outcome: &TxOutcome) {
        let kind = match outcome {
            TxOutcome::Confirmed(_) => {
                self.confirmed += 1;
                return;
            }
            TxOutcome::Superseded { .. } => {
                self.superseded += 1;
                return;
            }
            TxOutcome::Ambiguous { .. } => UnresolvedKind::Ambiguous,
            TxOutcome::Failed(err) => UnresolvedKind::Failed(err.to_string()),
        };
        self.unresolved.push(UnresolvedTx {
            offset,
            nonce,
            hash,
            kind,
        });
    }

    pub fn ambiguous_count(&self) -> usize {
        self.unresolved
            .iter()
            .filter(|tx| tx.kind == UnresolvedKind::Ambiguous)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.unresolved.len() - self.ambiguous_count()
    }
}

/// Aggregated result of a whole run, one entry per sender in config order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub senders: Vec<SenderReport>,
    /// Highest confirmed offset per sender when the run ended
    pub final_offsets: Vec<u64>,
}

impl RunReport {
    pub fn total_unresolved(&self) -> usize {
        self.senders.iter().map(|s| s.unresolved.len()).sum()
    }

    pub fn total_confirmed(&self) -> u64 {
        self.senders.iter().map(|s| s.confirmed).sum()
    }
}
