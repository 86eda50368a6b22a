//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub submissions_confirmed: IntCounter,
    pub submissions_failed: IntCounterVec,
    pub submission_retries: IntCounter,
    pub signature_requests: IntCounter,
    pub confirmation_polls: IntCounter,
    pub custody_activities: IntCounterVec,

    // Histograms
    pub signing_latency: Histogram,
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Transaction submission attempts started",
        ))?;

        let submissions_confirmed = IntCounter::with_opts(Opts::new(
            "submissions_confirmed",
            "Transactions confirmed at the requested commitment",
        ))?;

        let submissions_failed = IntCounterVec::new(
            Opts::new("submissions_failed", "Submission attempts that failed, by error category"),
            &["category"],
        )?;

        let submission_retries = IntCounter::with_opts(Opts::new(
            "submission_retries",
            "Full pipeline reruns after blockhash expiry",
        ))?;

        let signature_requests = IntCounter::with_opts(Opts::new(
            "signature_requests",
            "Signature requests sent to the remote signer",
        ))?;

        let confirmation_polls = IntCounter::with_opts(Opts::new(
            "confirmation_polls",
            "Signature status polls issued while waiting for confirmation",
        ))?;

        let custody_activities = IntCounterVec::new(
            Opts::new("custody_activities", "Custody activities submitted, by activity type"),
            &["activity"],
        )?;

        let signing_latency = Histogram::with_opts(
            HistogramOpts::new("signing_latency_seconds", "Remote signature latency")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 300.0]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from broadcast to confirmation",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "Ledger RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submissions_confirmed.clone()))?;
        registry.register(Box::new(submissions_failed.clone()))?;
        registry.register(Box::new(submission_retries.clone()))?;
        registry.register(Box::new(signature_requests.clone()))?;
        registry.register(Box::new(confirmation_polls.clone()))?;
        registry.register(Box::new(custody_activities.clone()))?;
        registry.register(Box::new(signing_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            submissions_confirmed,
            submissions_failed,
            submission_retries,
            signature_requests,
            confirmation_polls,
            custody_activities,
            signing_latency,
            confirmation_latency,
            rpc_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_failure(&self, category: &str) {
        self.submissions_failed.with_label_values(&[category]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
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

    pub fn observe_rpc(&self) {
        self.observe_duration(&metrics().rpc_latency);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
