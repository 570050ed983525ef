//! 接入计数器快照
//!
//! - GET /metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lis_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            messages_received: snapshot.messages_received,
            read_failures: snapshot.read_failures,
            plugin_unmatched: snapshot.plugin_unmatched,
            results_inserted: snapshot.results_inserted,
            queries_responded: snapshot.queries_responded,
            mappings_applied: snapshot.mappings_applied,
            unmapped_fields: snapshot.unmapped_fields,
            analyzer_errors_recorded: snapshot.analyzer_errors_recorded,
            reprocess_success: snapshot.reprocess_success,
            reprocess_failure: snapshot.reprocess_failure,
            duplicates_detected: snapshot.duplicates_detected,
            qc_results_processed: snapshot.qc_results_processed,
            qc_failures: snapshot.qc_failures,
            status_transitions: snapshot.status_transitions,
            processing_latency_ms_total: snapshot.processing_latency_ms_total,
            processing_latency_ms_count: snapshot.processing_latency_ms_count,
        })),
    )
        .into_response()
}
