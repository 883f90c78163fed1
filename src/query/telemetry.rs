use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const AUDIT_TARGET: &str = "nexus_shell::audit";
pub const METRICS_TARGET: &str = "nexus_shell::metrics";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
    pub enable_audit: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("NEXUS_SHELL_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(500);
        Self { slow_query_ms: slow, enable_audit: true }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub writes_total: AtomicU64,
    pub audits_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
    // For tests we can capture audit lines in-memory
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}
pub fn set_audit_enabled(enabled: bool) {
    TELEMETRY.cfg.write().enable_audit = enabled;
}
pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn log_query(collection: &str, filter_dbg: &str, duration_ms: u128, result_count: usize) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let threshold = TELEMETRY.cfg.read().slow_query_ms;
    let slow = u64::try_from(duration_ms).map_or(true, |ms| ms >= threshold);
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            target: METRICS_TARGET,
            "{}",
            serde_json::json!({
                "ts": now_ts(),
                "collection": collection,
                "filter": filter_dbg,
                "duration_ms": u64::try_from(duration_ms).unwrap_or(u64::MAX),
                "result_count": result_count,
                "slow": true
            })
        );
    }
}

pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    if !TELEMETRY.cfg.read().enable_audit {
        return;
    }
    TELEMETRY.metrics.audits_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(), "op": op, "collection": collection, "doc_id": doc_id
    })
    .to_string();
    log::info!(target: AUDIT_TARGET, "{line}");
    let audit_clone = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = audit_clone {
        sink.write().push(line);
    }
}

#[must_use]
pub fn metrics_text() -> String {
    // Prometheus exposition format
    let m = &TELEMETRY.metrics;
    format!(
        "nexus_shell_queries_total {}\n\
         nexus_shell_queries_slow_total {}\n\
         nexus_shell_writes_total {}\n\
         nexus_shell_audits_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.queries_slow_total.load(Ordering::Relaxed),
        m.writes_total.load(Ordering::Relaxed),
        m.audits_total.load(Ordering::Relaxed),
    )
}
