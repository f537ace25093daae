//! Nonce Manager Module
//!
//! Nonce bookkeeping for the dispatch engine: the per-sender local sequence
//! counter and the ledger of confirmed offsets shared by all senders.

// Submodules
pub mod nonce_ledger;
pub mod nonce_sequence;

// Re-exports for convenience
pub use nonce_ledger::NonceLedger;
pub use nonce_sequence::{SequenceCounter, SequenceSlot};
