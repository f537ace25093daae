//! Sender Dispatcher
//!
//! Drives one account through its whole stream: fetch the starting nonce,
//! then sign and broadcast transactions at a fixed pace, handing each
//! broadcast one to the bounded confirmation queue. Broadcast always happens
//! here, in offset order; only confirmation runs concurrently.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::errors::DispatchError;
use super::queue::ConfirmationQueue;
use super::resolver::ConfirmationResolver;
use crate::metrics::{metrics, Timer};
use crate::nonce_manager::{SequenceCounter, SequenceSlot};
use crate::rpc_manager::RpcTransport;
use crate::structured_logging::DispatchLogger;
use crate::tx_builder::{build_signed, TxSigner, TxTemplate};
use crate::types::{AccountId, SenderReport, TxHash, TxOutcome};

/// Pacing and queue sizing of one sender
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Transactions this sender issues
    pub tx_count: u64,
    /// Wait before every submission, and the extra wait under elevated pressure
    pub pace_delay: Duration,
    /// Confirmation tasks allowed to run at once
    pub concurrency_limit: usize,
    /// Wait between broadcast and the first status query
    pub settle_delay: Duration,
    /// Poll interval while the queue is saturated
    pub backpressure_poll: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tx_count: 100,
            pace_delay: Duration::from_millis(800 / 30),
            concurrency_limit: 90,
            settle_delay: Duration::from_millis(400),
            backpressure_poll: Duration::from_millis(100),
        }
    }
}

/// One sending account
#[derive(Clone)]
pub struct Sender {
    /// Position in the run; key into the nonce ledger
    pub index: usize,
    pub account_id: AccountId,
    /// Short name used in logs and metric labels
    pub nickname: String,
    pub signer: Arc<dyn TxSigner>,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("index", &self.index)
            .field("account_id", &self.account_id)
            .field("nickname", &self.nickname)
            .field("public_key", &self.signer.public_key())
            .finish()
    }
}

/// Issues one sender's transactions and collects their outcomes
pub struct SenderDispatcher {
    sender: Sender,
    template: TxTemplate,
    transport: Arc<dyn RpcTransport>,
    resolver: Arc<ConfirmationResolver>,
    config: DispatchConfig,
    logger: DispatchLogger,
}

impl SenderDispatcher {
    pub fn new(
        sender: Sender,
        template: TxTemplate,
        transport: Arc<dyn RpcTransport>,
        resolver: Arc<ConfirmationResolver>,
        config: DispatchConfig,
        logger: DispatchLogger,
    ) -> Self {
        Self {
            sender,
            template,
            transport,
            resolver,
            config,
            logger,
        }
    }

    /// Run the whole stream and wait for every confirmation task.
    ///
    /// Only the starting-nonce lookup aborts the sender. Every per-transaction
    /// failure is recorded in the report and the stream moves on.
    #[instrument(skip(self), name = "sender_dispatch", fields(sender = %self.sender.nickname))]
    pub async fn run(self) -> Result<SenderReport, DispatchError> {
        let Self {
            sender,
            template,
            transport,
            resolver,
            config,
            logger,
        } = self;

        let access = transport
            .view_access_key(&sender.account_id, &sender.signer.public_key())
            .await
            .map_err(|source| DispatchError::AccessKey {
                account: sender.account_id.clone(),
                source,
            })?;
        logger.log_setup(&sender.account_id, access.nonce, config.tx_count);

        let mut counter = SequenceCounter::new(access.nonce);
        let queue = ConfirmationQueue::new(config.concurrency_limit);
        let depth_gauge = metrics().queue_depth.with_label_values(&[sender.nickname.as_str()]);
        let mut report = SenderReport::new(sender.account_id.clone(), sender.nickname.clone());
        let mut in_flight: Vec<(SequenceSlot, TxHash, _)> = Vec::new();

        for _ in 0..config.tx_count {
            tokio::time::sleep(config.pace_delay).await;
            let slot = counter.next_slot();

            let built = build_signed(
                sender.signer.as_ref(),
                &template,
                sender.index,
                slot,
                access.block_hash,
            )
            .await;
            let (mut envelope, signed) = match built {
                Ok(pair) => pair,
                Err(err) => {
                    let outcome = TxOutcome::Failed(err.into());
                    metrics().record_outcome(&outcome);
                    logger.log_outcome(slot.offset, slot.nonce, None, &outcome);
                    report.record(slot.offset, slot.nonce, None, &outcome);
                    continue;
                }
            };

            // No re-send on error: the node may already hold the transaction.
            let hash = match transport.broadcast_tx_async(&signed).await {
                Ok(hash) => hash,
                Err(err) => {
                    metrics().broadcast_errors.inc();
                    let outcome = TxOutcome::Failed(DispatchError::Submit(err));
                    metrics().record_outcome(&outcome);
                    logger.log_outcome(slot.offset, slot.nonce, None, &outcome);
                    report.record(slot.offset, slot.nonce, None, &outcome);
                    continue;
                }
            };
            envelope.record_broadcast(hash);
            metrics().txs_submitted.inc();
            logger.log_broadcast(slot.offset, slot.nonce, &hash);

            let resolver = resolver.clone();
            let sender_id = sender.account_id.clone();
            let task_logger = logger.clone();
            let settle_delay = config.settle_delay;
            let handle = queue.spawn(async move {
                let timer = Timer::new();
                tokio::time::sleep(settle_delay).await;
                let outcome = resolver.resolve(&envelope, &sender_id).await;
                timer.observe_duration(&metrics().confirmation_latency);
                metrics().record_outcome(&outcome);
                task_logger.log_outcome(
                    envelope.offset(),
                    envelope.nonce(),
                    envelope.hash().as_ref(),
                    &outcome,
                );
                outcome
            });
            in_flight.push((slot, hash, handle));

            depth_gauge.set(queue.depth() as i64);
            let pressure = queue
                .apply_backpressure(config.backpressure_poll, config.pace_delay)
                .await;
            debug!(depth = queue.depth(), ?pressure, "Submission admitted");
        }

        logger.log_finished_broadcasting(counter.issued(), queue.depth());

        // Wait for everything; one failed task must not hide the others.
        let (slots, handles): (Vec<_>, Vec<_>) = in_flight
            .into_iter()
            .map(|(slot, hash, handle)| ((slot, hash), handle))
            .unzip();
        let results = join_all(handles).await;

        for ((slot, hash), result) in slots.into_iter().zip(results) {
            let outcome = result.unwrap_or_else(|join_err| {
                let outcome = TxOutcome::Failed(DispatchError::Internal(format!(
                    "confirmation task aborted: {}",
                    join_err
                )));
                metrics().record_outcome(&outcome);
                outcome
            });
            report.record(slot.offset, slot.nonce, Some(hash), &outcome);
        }
        depth_gauge.set(0);

        logger.log_report(&report);
        Ok(report)
    }
}
