//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

use crate::types::TxOutcome;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub txs_submitted: IntCounter,
    pub txs_confirmed: IntCounter,
    pub txs_superseded: IntCounter,
    pub txs_ambiguous: IntCounter,
    pub txs_failed: IntCounter,
    pub broadcast_errors: IntCounter,
    pub status_retries: IntCounter,

    // Gauges
    pub queue_depth: IntGaugeVec,

    // Histograms
    pub rpc_latency: HistogramVec,
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let txs_submitted = IntCounter::with_opts(Opts::new(
            "loadgen_txs_submitted_total",
            "Transactions accepted by the broadcast call",
        ))?;

        let txs_confirmed = IntCounter::with_opts(Opts::new(
            "loadgen_txs_confirmed_total",
            "Transactions with a known execution outcome",
        ))?;

        let txs_superseded = IntCounter::with_opts(Opts::new(
            "loadgen_txs_superseded_total",
            "Transactions overtaken by a later nonce of the same sender",
        ))?;

        let txs_ambiguous = IntCounter::with_opts(Opts::new(
            "loadgen_txs_ambiguous_total",
            "Transactions still unknown after the full trial budget",
        ))?;

        let txs_failed =
            IntCounter::with_opts(Opts::new("loadgen_txs_failed_total", "Transactions that failed"))?;

        let broadcast_errors = IntCounter::with_opts(Opts::new(
            "loadgen_broadcast_errors_total",
            "Broadcast calls that returned an error",
        ))?;

        let status_retries = IntCounter::with_opts(Opts::new(
            "loadgen_status_retries_total",
            "Status queries answered with unknown transaction",
        ))?;

        let queue_depth = IntGaugeVec::new(
            Opts::new(
                "loadgen_confirmation_queue_depth",
                "Confirmation tasks running or waiting, per sender",
            ),
            &["sender"],
        )?;

        let rpc_latency = HistogramVec::new(
            HistogramOpts::new("loadgen_rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method"],
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "loadgen_confirmation_latency_seconds",
                "Time from broadcast to terminal outcome",
            )
            .buckets(vec![0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 30.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(txs_submitted.clone()))?;
        registry.register(Box::new(txs_confirmed.clone()))?;
        registry.register(Box::new(txs_superseded.clone()))?;
        registry.register(Box::new(txs_ambiguous.clone()))?;
        registry.register(Box::new(txs_failed.clone()))?;
        registry.register(Box::new(broadcast_errors.clone()))?;
        registry.register(Box::new(status_retries.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            txs_submitted,
            txs_confirmed,
            txs_superseded,
            txs_ambiguous,
            txs_failed,
            broadcast_errors,
            status_retries,
            queue_depth,
            rpc_latency,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count one terminal outcome
    pub fn record_outcome(&self, outcome: &TxOutcome) {
        match outcome {
            TxOutcome::Confirmed(_) => self.txs_confirmed.inc(),
            TxOutcome::Superseded { .. } => self.txs_superseded.inc(),
            TxOutcome::Ambiguous { .. } => self.txs_ambiguous.inc(),
            TxOutcome::Failed(_) => self.txs_failed.inc(),
        }
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
