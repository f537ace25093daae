//! Transaction descriptors and envelopes
//!
//! A `TxEnvelope` is one constructed-and-(maybe)-submitted transaction. It is
//! created by the sender dispatcher right before broadcast, receives its hash
//! from the broadcast step and is then moved into the confirmation task, so
//! broadcast and resolution can never touch it at the same time.

use base64::Engine;
use borsh::BorshSerialize;
use std::io;

use super::errors::SigningError;
use super::signer::TxSigner;
use crate::nonce_manager::SequenceSlot;
use crate::types::{AccountId, Action, BlockHash, PublicKey, TxHash, ED25519_KEY_TYPE};

/// Unsigned transaction in the network's field order
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct TxDescriptor {
    pub signer_id: AccountId,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: AccountId,
    pub block_hash: BlockHash,
    pub actions: Vec<Action>,
}

impl TxDescriptor {
    /// Structural checks performed before signing
    pub fn validate(&self) -> Result<(), SigningError> {
        if self.signer_id.is_empty() {
            return Err(SigningError::malformed("empty signer account"));
        }
        if self.receiver_id.is_empty() {
            return Err(SigningError::malformed("empty receiver account"));
        }
        if self.actions.is_empty() {
            return Err(SigningError::malformed("transaction carries no actions"));
        }
        for action in &self.actions {
            if let Action::FunctionCall { method_name, .. } = action {
                if method_name.is_empty() {
                    return Err(SigningError::malformed("function call without method name"));
                }
            }
        }
        Ok(())
    }
}

/// Signed, network-ready transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub descriptor: TxDescriptor,
    /// Ed25519 signature over the transaction hash
    pub signature: [u8; 64],
    hash: TxHash,
}

// The hash is derived from the descriptor and never goes on the wire
impl BorshSerialize for SignedTransaction {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.descriptor.serialize(writer)?;
        ED25519_KEY_TYPE.serialize(writer)?;
        self.signature.serialize(writer)
    }
}

impl SignedTransaction {
    pub fn new(descriptor: TxDescriptor, signature: [u8; 64], hash: TxHash) -> Self {
        Self {
            descriptor,
            signature,
            hash,
        }
    }

    /// Canonical identifier of this transaction
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Wire encoding
    pub fn encode(&self) -> Result<Vec<u8>, SigningError> {
        Ok(borsh::to_vec(self)?)
    }

    /// Wire encoding as base64, the form the RPC expects
    pub fn to_base64(&self) -> Result<String, SigningError> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.encode()?))
    }
}

/// Per-sender parts of a descriptor that never change during a run
#[derive(Debug, Clone)]
pub struct TxTemplate {
    pub signer_id: AccountId,
    pub receiver_id: AccountId,
    pub actions: Vec<Action>,
}

impl TxTemplate {
    /// Fill in the per-transaction fields
    pub fn descriptor(&self, public_key: PublicKey, nonce: u64, block_hash: BlockHash) -> TxDescriptor {
        TxDescriptor {
            signer_id: self.signer_id.clone(),
            public_key,
            nonce,
            receiver_id: self.receiver_id.clone(),
            block_hash,
            actions: self.actions.clone(),
        }
    }
}

/// One attempt of one sender
#[derive(Debug, Clone)]
pub struct TxEnvelope {
    descriptor: TxDescriptor,
    hash: Option<TxHash>,
    sender_index: usize,
    offset: u64,
}

impl TxEnvelope {
    pub fn new(descriptor: TxDescriptor, sender_index: usize, offset: u64) -> Self {
        Self {
            descriptor,
            hash: None,
            sender_index,
            offset,
        }
    }

    pub fn descriptor(&self) -> &TxDescriptor {
        &self.descriptor
    }

    /// Submission identifier, present only after a successful broadcast
    pub fn hash(&self) -> Option<TxHash> {
        self.hash
    }

    pub fn sender_index(&self) -> usize {
        self.sender_index
    }

    /// 1-based position in the sender's stream; key into the nonce ledger
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn nonce(&self) -> u64 {
        self.descriptor.nonce
    }

    /// Record the identifier returned by the broadcast step
    pub fn record_broadcast(&mut self, hash: TxHash) {
        self.hash = Some(hash);
    }
}

/// Build the descriptor for `slot` and have the signer produce the payload.
///
/// No retry: a signing failure is final for this slot.
pub async fn build_signed<S>(
    signer: &S,
    template: &TxTemplate,
    sender_index: usize,
    slot: SequenceSlot,
    block_hash: BlockHash,
) -> Result<(TxEnvelope, SignedTransaction), SigningError>
where
    S: TxSigner + ?Sized,
{
    let descriptor = template.descriptor(signer.public_key(), slot.nonce, block_hash);
    let signed = signer.sign(&descriptor).await?;
    Ok((TxEnvelope::new(descriptor, sender_index, slot.offset), signed))
}
