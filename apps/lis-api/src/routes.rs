//! 路由定义
//!
//! 集中管理所有 API 路由：
//! - 健康检查与指标：/health, /metrics
//! - 报文提交：/messages/astm, /messages/hl7, /analyzers/{id}/files
//! - 仪器：/analyzers/*（含状态事件、映射预览与覆盖率）
//! - 错误看板：/analyzer-errors/*

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/messages/astm", post(submit_astm))
        .route("/messages/hl7", post(submit_hl7))
        .route("/analyzers", get(list_analyzers))
        .route("/analyzers/:analyzer_id", get(get_analyzer))
        .route("/analyzers/:analyzer_id/files", post(submit_file))
        .route(
            "/analyzers/:analyzer_id/status-events",
            post(post_status_event),
        )
        .route(
            "/analyzers/:analyzer_id/mappings/preview",
            post(preview_mappings),
        )
        .route(
            "/analyzers/:analyzer_id/mappings/coverage",
            get(mapping_coverage),
        )
        .route("/analyzer-errors", get(list_errors))
        .route("/analyzer-errors/statistics", get(error_statistics))
        .route(
            "/analyzer-errors/batch-acknowledge",
            post(batch_acknowledge_errors),
        )
        .route("/analyzer-errors/:error_id", get(get_error))
        .route(
            "/analyzer-errors/:error_id/acknowledge",
            post(acknowledge_error),
        )
        .route("/analyzer-errors/:error_id/resolve", post(resolve_error))
        .route(
            "/analyzer-errors/:error_id/reprocess",
            post(reprocess_error),
        )
}
