//! Submission pacing under confirmation backlog

use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{ConfirmationResolver, DispatchConfig, ResolverConfig, Sender, SenderDispatcher};
use crate::nonce_manager::NonceLedger;
use crate::observability::RunId;
use crate::structured_logging::DispatchLogger;
use crate::test_utils::{ScriptedTransport, StatusReply};
use crate::tx_builder::{Ed25519Signer, TxTemplate};
use crate::types::Action;

const ACCOUNT: &str = "u0.loadtest.testnet";
const PACE: Duration = Duration::from_millis(10);

/// Every status query takes a minute and then confirms, so confirmation
/// tasks pile up behind the submissions.
fn slow_network() -> Arc<ScriptedTransport> {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_default_reply(StatusReply::Confirmed);
    transport.set_status_delay(Duration::from_secs(60));
    transport
}

fn dispatcher(transport: Arc<ScriptedTransport>, tx_count: u64, limit: usize) -> SenderDispatcher {
    let ledger = Arc::new(NonceLedger::new(1));
    let resolver = Arc::new(ConfirmationResolver::new(
        transport.clone(),
        ledger,
        ResolverConfig::default(),
    ));
    SenderDispatcher::new(
        Sender {
            index: 0,
            account_id: ACCOUNT.to_string(),
            nickname: "u0".to_string(),
            signer: Arc::new(Ed25519Signer::from_seed([12; 32])),
        },
        TxTemplate {
            signer_id: ACCOUNT.to_string(),
            receiver_id: "counter.loadtest.testnet".to_string(),
            actions: vec![Action::Transfer { deposit: 1 }],
        },
        transport,
        resolver,
        DispatchConfig {
            tx_count,
            pace_delay: PACE,
            concurrency_limit: limit,
            settle_delay: Duration::ZERO,
            backpressure_poll: Duration::from_millis(100),
        },
        DispatchLogger::new(RunId::new(), "u0", None),
    )
}

#[tokio::test(start_paused = true)]
async fn test_nine_pending_of_ten_holds_the_tenth_submission() {
    let transport = slow_network();

    let report = dispatcher(transport.clone(), 10, 10).run().await.unwrap();
    assert_eq!(report.confirmed, 10);

    let broadcasts = transport.broadcasts();
    assert_eq!(broadcasts.len(), 10);
    // the first nine go out at the plain pace, with at most one extra pace step
    for pair in broadcasts[..9].windows(2) {
        assert!(pair[1].at - pair[0].at < PACE * 3);
    }
    // the tenth waits until the oldest confirmation drains the queue below 90%
    assert!(broadcasts[9].at - broadcasts[8].at >= Duration::from_secs(59));
}

#[tokio::test(start_paused = true)]
async fn test_light_backlog_keeps_plain_pace() {
    let transport = slow_network();

    dispatcher(transport.clone(), 7, 10).run().await.unwrap();

    let broadcasts = transport.broadcasts();
    assert_eq!(broadcasts.len(), 7);
    // depth stays below 70% until the seventh admission
    for pair in broadcasts.windows(2) {
        assert_eq!(pair[1].at - pair[0].at, PACE);
    }
}

#[tokio::test(start_paused = true)]
async fn test_elevated_backlog_adds_one_pace_step() {
    let transport = slow_network();

    dispatcher(transport.clone(), 9, 10).run().await.unwrap();

    let broadcasts = transport.broadcasts();
    // admission 7 reaches 70%, so the eighth submission waits two pace steps
    assert_eq!(broadcasts[7].at - broadcasts[6].at, PACE * 2);
}
