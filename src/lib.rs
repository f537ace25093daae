//! Ledger load generator library
//!
//! Drives sustained transaction load from several sender accounts against a
//! JSON-RPC node and classifies every transaction as confirmed, superseded,
//! ambiguous or failed. A run ends with a per-sender report of everything
//! that could not be confirmed.

pub mod config;
pub mod dispatch;
pub mod endpoints;
pub mod metrics;
pub mod observability;
pub mod structured_logging;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "nonce manager/mod.rs"]
pub mod nonce_manager;

#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{RunCoordinator, SenderSpec, Workload};
pub use types::{RunReport, SenderReport, TxOutcome};

#[cfg(test)]
mod tests {
    // Include test modules
    mod backpressure_tests;
    mod coordinator_tests;
    mod supersession_tests;
}
