//! Signer abstraction for transaction construction
//!
//! The dispatch engine only needs "descriptor + key in, signed payload and
//! canonical hash out". `Ed25519Signer` is the local-key implementation used
//! by the binary; tests substitute their own.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::envelope::{SignedTransaction, TxDescriptor};
use super::errors::SigningError;
use crate::types::{CryptoHash, PublicKey, TxHash};

const ED25519_PREFIX: &str = "ed25519:";

/// Async signer trait for signing transactions
#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Public key that signatures of this signer verify against
    fn public_key(&self) -> PublicKey;

    /// Sign a descriptor and return the network-ready payload
    async fn sign(&self, descriptor: &TxDescriptor) -> Result<SignedTransaction, SigningError>;
}

/// Borsh encoding of a descriptor (the signed message pre-image)
pub fn canonical_bytes(descriptor: &TxDescriptor) -> Result<Vec<u8>, SigningError> {
    Ok(borsh::to_vec(descriptor)?)
}

/// SHA-256 of the canonical encoding; the transaction's identifier
pub fn transaction_hash(canonical: &[u8]) -> TxHash {
    let digest = Sha256::digest(canonical);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    CryptoHash(out)
}

/// Local ed25519 keypair signer
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Build from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Build from the 64-byte `secret || public` form used by key files
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        // Validate length
        let mut arr: [u8; 64] = bytes.try_into().map_err(|_| {
            SigningError::InvalidKey(format!(
                "Invalid keypair length: expected 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        // Reject all-zero keys
        if arr.iter().all(|&b| b == 0) {
            return Err(SigningError::InvalidKey(
                "Invalid keypair: all-zero key rejected".to_string(),
            ));
        }
        let key = SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| SigningError::InvalidKey(format!("Invalid keypair bytes: {}", e)));
        arr.zeroize();
        Ok(Self { key: key? })
    }

    /// Parse an `ed25519:<base58>` secret key string
    pub fn from_secret_str(secret: &str) -> Result<Self, SigningError> {
        let encoded = secret.strip_prefix(ED25519_PREFIX).ok_or_else(|| {
            SigningError::InvalidKey("only ed25519 keys are supported".to_string())
        })?;
        let mut bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| SigningError::InvalidKey(format!("invalid base58 secret key: {}", e)))?;
        let signer = Self::from_keypair_bytes(&bytes);
        bytes.zeroize();
        signer
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key", &self.public_key())
            .finish()
    }
}

#[async_trait]
impl TxSigner for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        PublicKey(self.key.verifying_key().to_bytes())
    }

    async fn sign(&self, descriptor: &TxDescriptor) -> Result<SignedTransaction, SigningError> {
        descriptor.validate()?;

        let own_key = self.public_key();
        if descriptor.public_key != own_key {
            return Err(SigningError::KeyMismatch {
                expected: descriptor.public_key.to_string(),
                actual: own_key.to_string(),
            });
        }

        let canonical = canonical_bytes(descriptor)?;
        let hash = transaction_hash(&canonical);
        let signature = self.key.sign(hash.as_bytes());

        Ok(SignedTransaction::new(
            descriptor.clone(),
            signature.to_bytes(),
            hash,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn descriptor(public_key: PublicKey, nonce: u64) -> TxDescriptor {
        TxDescriptor {
            signer_id: "u0.factory.testnet".to_string(),
            public_key,
            nonce,
            receiver_id: "counter.factory.testnet".to_string(),
            block_hash: CryptoHash([2; 32]),
            actions: vec![Action::Transfer { deposit: 1 }],
        }
    }

    #[tokio::test]
    async fn test_signature_verifies_over_hash() {
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let signed = signer.sign(&descriptor(signer.public_key(), 7)).await.unwrap();

        let verifying = VerifyingKey::from_bytes(&signer.public_key().0).unwrap();
        let signature = Signature::from_bytes(&signed.signature);
        assert!(verifying.verify(signed.hash().as_bytes(), &signature).is_ok());
    }

    #[tokio::test]
    async fn test_hash_depends_on_nonce() {
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let a = signer.sign(&descriptor(signer.public_key(), 1)).await.unwrap();
        let b = signer.sign(&descriptor(signer.public_key(), 2)).await.unwrap();
        assert_ne!(a.hash(), b.hash());

        let again = signer.sign(&descriptor(signer.public_key(), 1)).await.unwrap();
        assert_eq!(a.hash(), again.hash());
    }

    #[tokio::test]
    async fn test_foreign_key_is_rejected() {
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let err = signer
            .sign(&descriptor(PublicKey([8; 32]), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::KeyMismatch { .. }));
    }

    #[test]
    fn test_secret_str_round_trip() {
        let seed = [3u8; 32];
        let signer = Ed25519Signer::from_seed(seed);
        let mut keypair = seed.to_vec();
        keypair.extend_from_slice(&signer.public_key().0);
        let text = format!("ed25519:{}", bs58::encode(&keypair).into_string());

        let parsed = Ed25519Signer::from_secret_str(&text).unwrap();
        assert_eq!(parsed.public_key(), signer.public_key());
    }

    #[test]
    fn test_invalid_secrets_rejected() {
        assert!(Ed25519Signer::from_secret_str("secp256k1:abc").is_err());
        assert!(Ed25519Signer::from_keypair_bytes(&[0u8; 64]).is_err());
        assert!(Ed25519Signer::from_keypair_bytes(&[1u8; 10]).is_err());
    }
}
