//! 追踪、请求 ID 与接入计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub read_failures: u64,
    pub plugin_unmatched: u64,
    pub results_inserted: u64,
    pub queries_responded: u64,
    pub mappings_applied: u64,
    pub unmapped_fields: u64,
    pub analyzer_errors_recorded: u64,
    pub reprocess_success: u64,
    pub reprocess_failure: u64,
    pub duplicates_detected: u64,
    pub qc_results_processed: u64,
    pub qc_failures: u64,
    pub status_transitions: u64,
    pub processing_latency_ms_total: u64,
    pub processing_latency_ms_count: u64,
}

/// 进程内计数器。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    read_failures: AtomicU64,
    plugin_unmatched: AtomicU64,
    results_inserted: AtomicU64,
    queries_responded: AtomicU64,
    mappings_applied: AtomicU64,
    unmapped_fields: AtomicU64,
    analyzer_errors_recorded: AtomicU64,
    reprocess_success: AtomicU64,
    reprocess_failure: AtomicU64,
    duplicates_detected: AtomicU64,
    qc_results_processed: AtomicU64,
    qc_failures: AtomicU64,
    status_transitions: AtomicU64,
    processing_latency_ms_total: AtomicU64,
    processing_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            plugin_unmatched: AtomicU64::new(0),
            results_inserted: AtomicU64::new(0),
            queries_responded: AtomicU64::new(0),
            mappings_applied: AtomicU64::new(0),
            unmapped_fields: AtomicU64::new(0),
            analyzer_errors_recorded: AtomicU64::new(0),
            reprocess_success: AtomicU64::new(0),
            reprocess_failure: AtomicU64::new(0),
            duplicates_detected: AtomicU64::new(0),
            qc_results_processed: AtomicU64::new(0),
            qc_failures: AtomicU64::new(0),
            status_transitions: AtomicU64::new(0),
            processing_latency_ms_total: AtomicU64::new(0),
            processing_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            plugin_unmatched: self.plugin_unmatched.load(Ordering::Relaxed),
            results_inserted: self.results_inserted.load(Ordering::Relaxed),
            queries_responded: self.queries_responded.load(Ordering::Relaxed),
            mappings_applied: self.mappings_applied.load(Ordering::Relaxed),
            unmapped_fields: self.unmapped_fields.load(Ordering::Relaxed),
            analyzer_errors_recorded: self.analyzer_errors_recorded.load(Ordering::Relaxed),
            reprocess_success: self.reprocess_success.load(Ordering::Relaxed),
            reprocess_failure: self.reprocess_failure.load(Ordering::Relaxed),
            duplicates_detected: self.duplicates_detected.load(Ordering::Relaxed),
            qc_results_processed: self.qc_results_processed.load(Ordering::Relaxed),
            qc_failures: self.qc_failures.load(Ordering::Relaxed),
            status_transitions: self.status_transitions.load(Ordering::Relaxed),
            processing_latency_ms_total: self.processing_latency_ms_total.load(Ordering::Relaxed),
            processing_latency_ms_count: self.processing_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的报文（任意传输方式）。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录读取失败（空报文、超时、断连）。
pub fn record_read_failure() {
    metrics().read_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录没有插件匹配的报文。
pub fn record_plugin_unmatched() {
    metrics().plugin_unmatched.fetch_add(1, Ordering::Relaxed);
}

/// 记录入库结果条数。
pub fn record_results_inserted(count: u64) {
    metrics()
        .results_inserted
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录已应答的查询报文。
pub fn record_query_responded() {
    metrics().queries_responded.fetch_add(1, Ordering::Relaxed);
}

/// 记录映射成功应用次数。
pub fn record_mapping_applied() {
    metrics().mappings_applied.fetch_add(1, Ordering::Relaxed);
}

/// 记录未映射字段数。
pub fn record_unmapped_fields(count: u64) {
    metrics().unmapped_fields.fetch_add(count, Ordering::Relaxed);
}

/// 记录新建的仪器错误。
pub fn record_analyzer_error() {
    metrics()
        .analyzer_errors_recorded
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_reprocess_success() {
    metrics().reprocess_success.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reprocess_failure() {
    metrics().reprocess_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录疑似重复结果（仍会入库）。
pub fn record_duplicate_detected() {
    metrics()
        .duplicates_detected
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_qc_result_processed() {
    metrics()
        .qc_results_processed
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_qc_failure() {
    metrics().qc_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录仪器状态迁移。
pub fn record_status_transition() {
    metrics()
        .status_transitions
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录单条报文处理耗时（毫秒）。
pub fn record_processing_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .processing_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .processing_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
