//! Run Coordinator
//!
//! Starts one dispatcher per sender against a shared nonce ledger and waits
//! for all of them. A sender that cannot start, or whose task dies, shows up
//! in the run report with a setup error; the others are unaffected.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::errors::DispatchError;
use super::resolver::{ConfirmationResolver, ResolverConfig};
use super::sender::{DispatchConfig, Sender, SenderDispatcher};
use crate::nonce_manager::NonceLedger;
use crate::observability::RunId;
use crate::rpc_manager::RpcTransport;
use crate::structured_logging::DispatchLogger;
use crate::tx_builder::{TxSigner, TxTemplate};
use crate::types::{AccountId, Action, RunReport, SenderReport};

/// A sending account as handed to the coordinator
#[derive(Clone)]
pub struct SenderSpec {
    pub account_id: AccountId,
    pub nickname: String,
    pub signer: Arc<dyn TxSigner>,
}

/// What every transaction of the run does
#[derive(Debug, Clone)]
pub struct Workload {
    pub receiver_id: AccountId,
    pub actions: Vec<Action>,
}

impl Workload {
    fn template_for(&self, signer_id: &str) -> TxTemplate {
        TxTemplate {
            signer_id: signer_id.to_string(),
            receiver_id: self.receiver_id.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// Runs all senders of one load run
pub struct RunCoordinator {
    transport: Arc<dyn RpcTransport>,
    resolver_config: ResolverConfig,
    dispatch_config: DispatchConfig,
    workload: Workload,
    explorer_url: Option<String>,
    run_id: RunId,
}

impl RunCoordinator {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        resolver_config: ResolverConfig,
        dispatch_config: DispatchConfig,
        workload: Workload,
    ) -> Self {
        Self {
            transport,
            resolver_config,
            dispatch_config,
            workload,
            explorer_url: None,
            run_id: RunId::new(),
        }
    }

    /// Link confirmed transactions to this explorer in the logs
    pub fn with_explorer(mut self, explorer_url: impl Into<String>) -> Self {
        self.explorer_url = Some(explorer_url.into());
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Dispatch every sender concurrently and collect one report per sender,
    /// in the order given.
    pub async fn run(&self, senders: Vec<SenderSpec>) -> RunReport {
        info!(
            run_id = %self.run_id,
            senders = senders.len(),
            tx_per_sender = self.dispatch_config.tx_count,
            receiver_id = %self.workload.receiver_id,
            "Starting load run"
        );

        let ledger = Arc::new(NonceLedger::new(senders.len()));
        if ledger.is_empty() {
            warn!(run_id = %self.run_id, "No senders to dispatch");
            return RunReport::default();
        }
        let resolver = Arc::new(ConfirmationResolver::new(
            self.transport.clone(),
            ledger.clone(),
            self.resolver_config.clone(),
        ));

        let mut names = Vec::with_capacity(senders.len());
        let mut handles = Vec::with_capacity(senders.len());
        for (index, spec) in senders.into_iter().enumerate() {
            let logger = DispatchLogger::new(
                self.run_id.clone(),
                spec.nickname.clone(),
                self.explorer_url.clone(),
            );
            let dispatcher = SenderDispatcher::new(
                Sender {
                    index,
                    account_id: spec.account_id.clone(),
                    nickname: spec.nickname.clone(),
                    signer: spec.signer,
                },
                self.workload.template_for(&spec.account_id),
                self.transport.clone(),
                resolver.clone(),
                self.dispatch_config.clone(),
                logger.clone(),
            );
            names.push((spec.account_id, logger));
            handles.push(tokio::spawn(dispatcher.run()));
        }

        let results = join_all(handles).await;

        let mut report = RunReport::default();
        for ((account_id, logger), result) in names.into_iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(join_err) => Err(DispatchError::Internal(format!(
                    "dispatcher task aborted: {}",
                    join_err
                ))),
            };
            let sender_report = match outcome {
                Ok(sender_report) => sender_report,
                Err(err) => {
                    error!(run_id = %self.run_id, %account_id, category = err.category(), error = %err, "Sender did not complete");
                    let mut failed = SenderReport::new(account_id, logger.nickname());
                    failed.setup_error = Some(err.to_string());
                    logger.log_report(&failed);
                    failed
                }
            };
            report.senders.push(sender_report);
        }
        report.final_offsets = ledger.snapshot();

        info!(
            run_id = %self.run_id,
            confirmed = report.total_confirmed(),
            unresolved = report.total_unresolved(),
            "Load run finished"
        );
        report
    }
}
