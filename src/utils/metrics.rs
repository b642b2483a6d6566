use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency windows keep only the most recent samples.
pub const MAX_LATENCY_SAMPLES: usize = 1024;

/// Global metrics collector for the application.
///
/// Tracks model usage, image admission and request outcomes.
/// Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Model API metrics
    model_calls_total: AtomicUsize,
    model_calls_success: AtomicUsize,
    model_calls_failed: AtomicUsize,
    model_tokens_input: AtomicU64,
    model_tokens_output: AtomicU64,
    model_latency_ms: RwLock<VecDeque<u64>>,

    // Image metrics
    images_normalized: AtomicUsize,
    images_rejected: AtomicUsize,

    // Request metrics
    requests_completed: AtomicUsize,
    requests_rejected: AtomicUsize,
    summaries_failed: AtomicUsize,
    request_duration_ms: RwLock<VecDeque<u64>>,

    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                model_calls_total: AtomicUsize::new(0),
                model_calls_success: AtomicUsize::new(0),
                model_calls_failed: AtomicUsize::new(0),
                model_tokens_input: AtomicU64::new(0),
                model_tokens_output: AtomicU64::new(0),
                model_latency_ms: RwLock::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES)),
                images_normalized: AtomicUsize::new(0),
                images_rejected: AtomicUsize::new(0),
                requests_completed: AtomicUsize::new(0),
                requests_rejected: AtomicUsize::new(0),
                summaries_failed: AtomicUsize::new(0),
                request_duration_ms: RwLock::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES)),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_model_call(
        &self,
        success: bool,
        duration: Duration,
        input_tokens: u64,
        output_tokens: u64,
    ) {
        self.inner.model_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.model_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.model_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.model_tokens_input.fetch_add(input_tokens, Ordering::Relaxed);
        self.inner.model_tokens_output.fetch_add(output_tokens, Ordering::Relaxed);
        push_sample(&self.inner.model_latency_ms, duration);
    }

    pub fn record_image_normalized(&self) {
        self.inner.images_normalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_rejected(&self) {
        self.inner.images_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_completed(&self, duration: Duration) {
        self.inner.requests_completed.fetch_add(1, Ordering::Relaxed);
        push_sample(&self.inner.request_duration_ms, duration);
    }

    pub fn record_request_rejected(&self) {
        self.inner.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_summary_failed(&self) {
        self.inner.summaries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_requests(&self, endpoint: &str) -> usize {
        self.inner
            .endpoint_counters
            .get(endpoint)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut latency: Vec<u64> = self.inner.model_latency_ms.read().iter().copied().collect();
        latency.sort_unstable();
        let model_latency_avg_ms = avg(&latency);
        let model_latency_p50_ms = percentile(&latency, 0.5);
        let model_latency_p95_ms = percentile(&latency, 0.95);
        let model_latency_p99_ms = percentile(&latency, 0.99);

        let request_avg_ms = {
            let durations = self.inner.request_duration_ms.read();
            avg_iter(durations.iter().copied(), durations.len())
        };

        MetricsSnapshot {
            model_calls_total: self.inner.model_calls_total.load(Ordering::Relaxed),
            model_calls_success: self.inner.model_calls_success.load(Ordering::Relaxed),
            model_calls_failed: self.inner.model_calls_failed.load(Ordering::Relaxed),
            model_tokens_input: self.inner.model_tokens_input.load(Ordering::Relaxed),
            model_tokens_output: self.inner.model_tokens_output.load(Ordering::Relaxed),
            model_latency_avg_ms,
            model_latency_p50_ms,
            model_latency_p95_ms,
            model_latency_p99_ms,
            images_normalized: self.inner.images_normalized.load(Ordering::Relaxed),
            images_rejected: self.inner.images_rejected.load(Ordering::Relaxed),
            requests_completed: self.inner.requests_completed.load(Ordering::Relaxed),
            requests_rejected: self.inner.requests_rejected.load(Ordering::Relaxed),
            summaries_failed: self.inner.summaries_failed.load(Ordering::Relaxed),
            request_avg_ms,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP model_calls_total Total number of model API calls made
# TYPE model_calls_total counter
model_calls_total {{}} {}

# HELP model_calls_success Number of successful model API calls
# TYPE model_calls_success counter
model_calls_success {{}} {}

# HELP model_calls_failed Number of failed model API calls
# TYPE model_calls_failed counter
model_calls_failed {{}} {}

# HELP model_tokens_input_total Total input tokens consumed
# TYPE model_tokens_input_total counter
model_tokens_input_total {{}} {}

# HELP model_tokens_output_total Total output tokens generated
# TYPE model_tokens_output_total counter
model_tokens_output_total {{}} {}

# HELP model_latency_avg_ms Average model API latency in milliseconds
# TYPE model_latency_avg_ms gauge
model_latency_avg_ms {{}} {}

# HELP images_normalized_total Images accepted and normalized
# TYPE images_normalized_total counter
images_normalized_total {{}} {}

# HELP images_rejected_total Images that failed normalization
# TYPE images_rejected_total counter
images_rejected_total {{}} {}

# HELP requests_completed_total Analyze requests that produced a summary
# TYPE requests_completed_total counter
requests_completed_total {{}} {}

# HELP requests_rejected_total Analyze requests rejected before processing
# TYPE requests_rejected_total counter
requests_rejected_total {{}} {}

# HELP summaries_failed_total Analyze requests whose summary call failed
# TYPE summaries_failed_total counter
summaries_failed_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.model_calls_total,
            snapshot.model_calls_success,
            snapshot.model_calls_failed,
            snapshot.model_tokens_input,
            snapshot.model_tokens_output,
            snapshot.model_latency_avg_ms,
            snapshot.images_normalized,
            snapshot.images_rejected,
            snapshot.requests_completed,
            snapshot.requests_rejected,
            snapshot.summaries_failed,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub model_calls_total: usize,
    pub model_calls_success: usize,
    pub model_calls_failed: usize,
    pub model_tokens_input: u64,
    pub model_tokens_output: u64,
    pub model_latency_avg_ms: u64,
    pub model_latency_p50_ms: u64,
    pub model_latency_p95_ms: u64,
    pub model_latency_p99_ms: u64,
    pub images_normalized: usize,
    pub images_rejected: usize,
    pub requests_completed: usize,
    pub requests_rejected: usize,
    pub summaries_failed: usize,
    pub request_avg_ms: u64,
    pub uptime_seconds: u64,
}

fn push_sample(window: &RwLock<VecDeque<u64>>, duration: Duration) {
    let mut window = window.write();
    if window.len() == MAX_LATENCY_SAMPLES {
        window.pop_front();
    }
    window.push_back(duration.as_millis() as u64);
}

// Expects `sorted` in ascending order
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    avg_iter(values.iter().copied(), values.len())
}

fn avg_iter(values: impl Iterator<Item = u64>, len: usize) -> u64 {
    if len == 0 {
        return 0;
    }
    values.sum::<u64>() / len as u64
}
