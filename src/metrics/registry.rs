use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics registry.
///
/// Atomic increments only, no locks. All counters use `Ordering::Relaxed`;
/// none of them synchronizes anything else.
pub struct Metrics {
    // Request outcomes (monotonically increasing)
    pub requests_captured_total: AtomicU64,
    pub requests_rejected_total: AtomicU64,
    pub body_read_errors_total: AtomicU64,
    pub payload_bytes_total: AtomicU64,

    // Chaos injection
    pub chaos_stalls_total: AtomicU64,
    pub chaos_stall_ms_total: AtomicU64,
    pub config_updates_total: AtomicU64,

    // History buffer
    pub history_evictions_total: AtomicU64,

    // Handlers currently running (can increase/decrease)
    pub inflight_requests: AtomicU64,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self {
            requests_captured_total: AtomicU64::new(0),
            requests_rejected_total: AtomicU64::new(0),
            body_read_errors_total: AtomicU64::new(0),
            payload_bytes_total: AtomicU64::new(0),
            chaos_stalls_total: AtomicU64::new(0),
            chaos_stall_ms_total: AtomicU64::new(0),
            config_updates_total: AtomicU64::new(0),
            history_evictions_total: AtomicU64::new(0),
            inflight_requests: AtomicU64::new(0),
        }
    }

    // ==================== Counter Operations (Hot Path) ====================

    /// Called once per record handed to the history queue.
    #[inline]
    pub fn inc_requests_captured(&self, payload_bytes: u64) {
        self.requests_captured_total.fetch_add(1, Ordering::Relaxed);
        self.payload_bytes_total.fetch_add(payload_bytes, Ordering::Relaxed);
    }

    /// Called when the admission guard refuses a request.
    #[inline]
    pub fn inc_requests_rejected(&self) {
        self.requests_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_body_read_errors(&self) {
        self.body_read_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Called for every stall decision, including zero-length ones.
    #[inline]
    pub fn record_chaos_stall(&self, millis: u64) {
        self.chaos_stalls_total.fetch_add(1, Ordering::Relaxed);
        self.chaos_stall_ms_total.fetch_add(millis, Ordering::Relaxed);
    }

    /// Called once per field actually overwritten by a config request.
    #[inline]
    pub fn inc_config_updates(&self) {
        self.config_updates_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_history_evictions(&self) {
        self.history_evictions_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_inflight(&self) {
        self.inflight_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dec_inflight(&self) {
        self.inflight_requests.fetch_sub(1, Ordering::Relaxed);
    }

    // ==================== Snapshot Operations (Export Path) ====================

    pub fn snapshot_counters(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_captured_total: self.requests_captured_total.load(Ordering::Relaxed),
            requests_rejected_total: self.requests_rejected_total.load(Ordering::Relaxed),
            body_read_errors_total: self.body_read_errors_total.load(Ordering::Relaxed),
            payload_bytes_total: self.payload_bytes_total.load(Ordering::Relaxed),
            chaos_stalls_total: self.chaos_stalls_total.load(Ordering::Relaxed),
            chaos_stall_ms_total: self.chaos_stall_ms_total.load(Ordering::Relaxed),
            config_updates_total: self.config_updates_total.load(Ordering::Relaxed),
            history_evictions_total: self.history_evictions_total.load(Ordering::Relaxed),
            inflight_requests: self.inflight_requests.load(Ordering::Relaxed),
        }
    }

    /// Export all metrics in Prometheus text format.
    ///
    /// Format:
    /// # HELP metric_name Description
    /// # TYPE metric_name counter
    /// metric_name value
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot_counters();
        let entries: [(&str, &str, &str, u64); 9] = [
            ("requests_captured_total", "counter", "Total number of requests recorded into history", snapshot.requests_captured_total),
            ("requests_rejected_total", "counter", "Total number of requests refused by the in-flight limit", snapshot.requests_rejected_total),
            ("body_read_errors_total", "counter", "Total number of request bodies that failed mid-read", snapshot.body_read_errors_total),
            ("payload_bytes_total", "counter", "Total request body bytes digested", snapshot.payload_bytes_total),
            ("chaos_stalls_total", "counter", "Total number of responses stalled by chaos injection", snapshot.chaos_stalls_total),
            ("chaos_stall_ms_total", "counter", "Total milliseconds spent in chaos stalls", snapshot.chaos_stall_ms_total),
            ("config_updates_total", "counter", "Total number of chaos fields overwritten", snapshot.config_updates_total),
            ("history_evictions_total", "counter", "Total number of records evicted from history", snapshot.history_evictions_total),
            ("inflight_requests", "gauge", "Current number of running request handlers", snapshot.inflight_requests),
        ];

        let mut output = String::new();
        for (name, kind, help, value) in entries {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} {}\n", name, kind));
            output.push_str(&format!("{} {}\n", name, value));
        }
        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_captured_total: u64,
    pub requests_rejected_total: u64,
    pub body_read_errors_total: u64,
    pub payload_bytes_total: u64,
    pub chaos_stalls_total: u64,
    pub chaos_stall_ms_total: u64,
    pub config_updates_total: u64,
    pub history_evictions_total: u64,
    pub inflight_requests: u64,
}

// Global metrics singleton, shared by every handler and the history consumer.
lazy_static::lazy_static! {
    pub static ref METRICS: Metrics = Metrics::new();
}
