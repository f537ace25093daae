//! Confirmation Resolver
//!
//! Polls the node for one broadcast transaction until its outcome is known or
//! the trial budget runs out. A "not found" answer is ambiguous on its own:
//! the transaction may simply not be visible yet. It becomes conclusive only
//! through the shared nonce ledger. Offsets of one sender execute in order,
//! so once a higher offset of the same sender has executed, a still-missing
//! lower one can never execute.
//!
//! That inference assumes the network never reuses a nonce and never
//! finalizes one sender's transactions out of order.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::errors::DispatchError;
use crate::metrics::metrics;
use crate::nonce_manager::NonceLedger;
use crate::rpc_manager::RpcTransport;
use crate::tx_builder::TxEnvelope;
use crate::types::TxOutcome;

/// Trial budget and pacing of the status polling
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Status queries before giving up
    pub max_trials: u32,
    /// Wait between two not-found answers
    pub retry_delay: Duration,
    /// Supersession is only concluded on trials after this one (0-based),
    /// so propagation lag is not mistaken for a dropped transaction
    pub min_trials_before_supersede: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_trials: 10,
            retry_delay: Duration::from_millis(400),
            min_trials_before_supersede: 6,
        }
    }
}

/// Resolves broadcast envelopes to a terminal `TxOutcome`
pub struct ConfirmationResolver {
    transport: Arc<dyn RpcTransport>,
    ledger: Arc<NonceLedger>,
    config: ResolverConfig,
}

impl ConfirmationResolver {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        ledger: Arc<NonceLedger>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            transport,
            ledger,
            config,
        }
    }

    /// Poll until `Confirmed`, `Superseded`, `Ambiguous` or `Failed`.
    pub async fn resolve(&self, envelope: &TxEnvelope, sender_id: &str) -> TxOutcome {
        let Some(hash) = envelope.hash() else {
            return TxOutcome::Failed(DispatchError::NotBroadcast);
        };
        let sender_index = envelope.sender_index();
        let offset = envelope.offset();

        for trial in 0..self.config.max_trials {
            match self.transport.tx_status(&hash, sender_id).await {
                Ok(confirmed) => {
                    if trial != 0 {
                        debug!(%hash, retries = trial, "Transaction confirmed after retries");
                    }
                    self.ledger.raise(sender_index, offset);
                    return TxOutcome::Confirmed(confirmed);
                }
                Err(err) if err.is_not_found() => {
                    metrics().status_retries.inc();

                    let latest = self.ledger.read(sender_index);
                    if latest > offset && trial > self.config.min_trials_before_supersede {
                        debug!(%hash, offset, latest, trial, "Later offset already confirmed");
                        return TxOutcome::Superseded { trials: trial + 1 };
                    }

                    if trial + 1 < self.config.max_trials {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
                Err(err) => {
                    warn!(%hash, error = %err, "Unexpected status query error");
                    return TxOutcome::Failed(DispatchError::Query(err));
                }
            }
        }

        let trials = self.config.max_trials;
        // the last query must itself have been past the protected window
        let past_threshold = trials > self.config.min_trials_before_supersede.saturating_add(1);
        if past_threshold && self.ledger.read(sender_index) > offset {
            TxOutcome::Superseded { trials }
        } else {
            TxOutcome::Ambiguous { trials }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_manager::RpcError;
    use crate::test_utils::{envelope_with_hash, ScriptedTransport, StatusReply};
    use crate::types::CryptoHash;
    use tokio::time::Instant;

    fn resolver(transport: Arc<ScriptedTransport>, ledger: Arc<NonceLedger>) -> ConfirmationResolver {
        ConfirmationResolver::new(transport, ledger, ResolverConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_raises_ledger() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        let envelope = envelope_with_hash(0, 4, CryptoHash([4; 32]));
        transport.script_status(CryptoHash([4; 32]), vec![StatusReply::NotFound, StatusReply::Confirmed]);

        let outcome = resolver(transport.clone(), ledger.clone())
            .resolve(&envelope, "u0.factory.testnet")
            .await;

        assert!(matches!(outcome, TxOutcome::Confirmed(_)));
        assert_eq!(ledger.read(0), 4);
        assert_eq!(transport.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_lower_offset_does_not_regress_ledger() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        ledger.raise(0, 9);
        let envelope = envelope_with_hash(0, 2, CryptoHash([2; 32]));
        transport.script_status(CryptoHash([2; 32]), vec![StatusReply::Confirmed]);

        let outcome = resolver(transport, ledger.clone())
            .resolve(&envelope, "u0")
            .await;

        assert!(matches!(outcome, TxOutcome::Confirmed(_)));
        assert_eq!(ledger.read(0), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_found_is_ambiguous_after_full_budget() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        let envelope = envelope_with_hash(0, 1, CryptoHash([1; 32]));

        let started = Instant::now();
        let outcome = resolver(transport.clone(), ledger)
            .resolve(&envelope, "u0")
            .await;

        assert!(matches!(outcome, TxOutcome::Ambiguous { trials: 10 }));
        assert_eq!(transport.status_calls(), 10);
        // nine waits between ten queries
        assert_eq!(started.elapsed(), Duration::from_millis(400 * 9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersession_waits_for_threshold() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        ledger.raise(0, 3);
        let envelope = envelope_with_hash(0, 1, CryptoHash([1; 32]));

        let outcome = resolver(transport.clone(), ledger)
            .resolve(&envelope, "u0")
            .await;

        // trials 0..=6 are protected; trial 7 is the first allowed to give up
        assert!(matches!(outcome, TxOutcome::Superseded { trials: 8 }));
        assert_eq!(transport.status_calls(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_budget_never_supersedes_inside_protected_window() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        ledger.raise(0, 3);
        let envelope = envelope_with_hash(0, 1, CryptoHash([1; 32]));
        let config = ResolverConfig {
            max_trials: 3,
            retry_delay: Duration::from_millis(400),
            min_trials_before_supersede: 6,
        };

        let outcome = ConfirmationResolver::new(transport.clone(), ledger, config)
            .resolve(&envelope, "u0")
            .await;

        assert!(matches!(outcome, TxOutcome::Ambiguous { trials: 3 }));
        assert_eq!(transport.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_ending_on_threshold_stays_ambiguous() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        ledger.raise(0, 3);
        let envelope = envelope_with_hash(0, 1, CryptoHash([1; 32]));
        // last query is trial 6, which is still protected
        let config = ResolverConfig {
            max_trials: 7,
            retry_delay: Duration::from_millis(400),
            min_trials_before_supersede: 6,
        };

        let outcome = ConfirmationResolver::new(transport, ledger, config)
            .resolve(&envelope, "u0")
            .await;

        assert!(matches!(outcome, TxOutcome::Ambiguous { trials: 7 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_offset_is_not_supersession() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        ledger.raise(0, 5);
        let envelope = envelope_with_hash(0, 5, CryptoHash([5; 32]));

        let outcome = resolver(transport, ledger).resolve(&envelope, "u0").await;
        assert!(matches!(outcome, TxOutcome::Ambiguous { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_error_fails_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        let envelope = envelope_with_hash(0, 1, CryptoHash([1; 32]));
        transport.script_status(
            CryptoHash([1; 32]),
            vec![StatusReply::NotFound, StatusReply::Error],
        );

        let outcome = resolver(transport.clone(), ledger.clone())
            .resolve(&envelope, "u0")
            .await;

        match outcome {
            TxOutcome::Failed(DispatchError::Query(RpcError::RpcResponse { .. })) => {}
            other => panic!("Expected query failure, got {:?}", other),
        }
        assert_eq!(transport.status_calls(), 2);
        assert_eq!(ledger.read(0), 0);
    }

    #[tokio::test]
    async fn test_unbroadcast_envelope_is_never_queried() {
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(NonceLedger::new(1));
        let envelope = crate::test_utils::envelope(0, 1);

        let outcome = resolver(transport.clone(), ledger).resolve(&envelope, "u0").await;

        assert!(matches!(outcome, TxOutcome::Failed(DispatchError::NotBroadcast)));
        assert_eq!(transport.status_calls(), 0);
    }
}
