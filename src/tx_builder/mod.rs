//! Transaction Builder
//!
//! Turns one slot of a sender's stream into a signed, broadcastable
//! transaction:
//! - **envelope**: descriptor, signed payload and the per-attempt envelope
//! - **signer**: the `TxSigner` seam and the local ed25519 implementation
//! - **errors**: signing error taxonomy
//!
//! Construction never retries. A descriptor that cannot be signed is
//! reported as failed before anything reaches the network.

pub mod envelope;
pub mod errors;
pub mod signer;

pub use envelope::{build_signed, SignedTransaction, TxDescriptor, TxEnvelope, TxTemplate};
pub use errors::SigningError;
pub use signer::{Ed25519Signer, TxSigner};
