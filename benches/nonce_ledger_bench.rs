//! Benchmarks for the shared nonce ledger and transaction signing
//!
//! Benchmarks:
//! - Uncontended raise and read
//! - Raise under contention from several threads on one slot
//! - Signing one transaction descriptor

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;

use loadgen::nonce_manager::NonceLedger;
use loadgen::tx_builder::{Ed25519Signer, TxSigner, TxTemplate};
use loadgen::types::{Action, CryptoHash};

fn bench_uncontended(c: &mut Criterion) {
    let ledger = NonceLedger::new(4);
    let mut candidate = 0u64;

    c.bench_function("ledger_raise_uncontended", |b| {
        b.iter(|| {
            candidate += 1;
            black_box(ledger.raise(1, candidate))
        })
    });

    c.bench_function("ledger_read", |b| b.iter(|| black_box(ledger.read(1))));
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_raise_contended");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let ledger = Arc::new(NonceLedger::new(1));
                let handles: Vec<_> = (0..threads as u64)
                    .map(|t| {
                        let ledger = ledger.clone();
                        thread::spawn(move || {
                            for i in 0..1_000u64 {
                                ledger.raise(0, i * threads as u64 + t);
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
                black_box(ledger.read(0))
            })
        });
    }

    group.finish();
}

fn bench_signing(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let signer = Ed25519Signer::from_seed([8; 32]);
    let template = TxTemplate {
        signer_id: "u0.loadtest.testnet".to_string(),
        receiver_id: "counter.loadtest.testnet".to_string(),
        actions: vec![Action::function_call(
            "increment",
            &serde_json::json!({}),
            50_000_000_000_000,
        )],
    };
    let descriptor = template.descriptor(signer.public_key(), 1, CryptoHash([2; 32]));

    c.bench_function("sign_descriptor", |b| {
        b.iter(|| rt.block_on(signer.sign(black_box(&descriptor))).unwrap())
    });
}

criterion_group!(benches, bench_uncontended, bench_contended, bench_signing);
criterion_main!(benches);
