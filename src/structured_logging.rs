//! Structured logging of dispatch events
//!
//! One logger per sender. Lines carry the run id and the sender nickname so a
//! multi-sender run can be filtered per account.

use crate::observability::RunId;
use crate::types::{SenderReport, TxHash, TxOutcome};

/// Structured logger for one sender's dispatch events
#[derive(Debug, Clone)]
pub struct DispatchLogger {
    run_id: RunId,
    nickname: String,
    explorer_url: Option<String>,
}

impl DispatchLogger {
    pub fn new(run_id: RunId, nickname: impl Into<String>, explorer_url: Option<String>) -> Self {
        Self {
            run_id,
            nickname: nickname.into(),
            explorer_url: explorer_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Explorer page of a transaction, if an explorer is configured
    pub fn tx_link(&self, hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/transactions/{}", base, hash))
    }

    /// Explorer page of a block, if an explorer is configured
    pub fn block_link(&self, block_hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/blocks/{}", base, block_hash))
    }

    pub fn log_setup(&self, account_id: &str, start_nonce: u64, tx_count: u64) {
        tracing::info!(
            run_id = %self.run_id.short(),
            sender = %self.nickname,
            account_id = %account_id,
            start_nonce = %start_nonce,
            tx_count = %tx_count,
            "Sender ready"
        );
    }

    pub fn log_broadcast(&self, offset: u64, nonce: u64, hash: &TxHash) {
        tracing::debug!(
            run_id = %self.run_id.short(),
            sender = %self.nickname,
            offset = %offset,
            nonce = %nonce,
            hash = %hash,
            "Transaction broadcast"
        );
    }

    pub fn log_outcome(&self, offset: u64, nonce: u64, hash: Option<&TxHash>, outcome: &TxOutcome) {
        let hash = hash.map(ToString::to_string).unwrap_or_default();
        match outcome {
            TxOutcome::Confirmed(tx) => tracing::info!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                offset = %offset,
                nonce = %nonce,
                hash = %tx.hash,
                block_hash = %tx.block_hash,
                status = %tx.status,
                tx = ?self.tx_link(&tx.hash),
                block = ?self.block_link(&tx.block_hash),
                "Transaction confirmed"
            ),
            TxOutcome::Superseded { trials } => tracing::info!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                offset = %offset,
                hash = %hash,
                trials = %trials,
                nonce = %nonce,
                "Transaction dropped, nonce already too low"
            ),
            TxOutcome::Ambiguous { trials } => tracing::warn!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                offset = %offset,
                hash = %hash,
                trials = %trials,
                nonce = %nonce,
                "Transaction not found, could still have been executed"
            ),
            TxOutcome::Failed(err) => tracing::error!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                offset = %offset,
                nonce = %nonce,
                hash = %hash,
                category = %err.category(),
                endpoint = ?err.endpoint(),
                error = %err,
                "Transaction failed"
            ),
        }
    }

    pub fn log_finished_broadcasting(&self, broadcast: u64, in_flight: usize) {
        tracing::info!(
            run_id = %self.run_id.short(),
            sender = %self.nickname,
            broadcast = %broadcast,
            in_flight = %in_flight,
            "Finished broadcasting, waiting for confirmations"
        );
    }

    pub fn log_report(&self, report: &SenderReport) {
        if let Some(err) = &report.setup_error {
            tracing::error!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                error = %err,
                "Sender could not start"
            );
        } else if report.unresolved.is_empty() {
            tracing::info!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                confirmed = %report.confirmed,
                superseded = %report.superseded,
                "All transactions resolved"
            );
        } else {
            tracing::warn!(
                run_id = %self.run_id.short(),
                sender = %self.nickname,
                unresolved = %report.unresolved.len(),
                ambiguous = %report.ambiguous_count(),
                failed = %report.failed_count(),
                "Sender had {} txs that could not be confirmed",
                report.unresolved.len()
            );
        }
    }
}
