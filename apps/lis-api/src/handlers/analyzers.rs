//! 仪器 handlers
//!
//! - GET /analyzers - 列出仪器
//! - GET /analyzers/{id} - 仪器详情
//! - POST /analyzers/{id}/status-events - 生命周期事件或显式状态迁移
//!
//! 状态事件请求体二选一：`event`（如 `CONNECTION_TEST_FAILED`）走事件表，
//! `targetStatus` 走状态迁移表；非法迁移返回 409。

use super::AnalyzerPath;
use crate::AppState;
use crate::utils::parse_optional;
use crate::utils::response::{
    analyzer_to_dto, bad_request_error, lifecycle_error, not_found_error, status_change_to_dto,
    storage_error,
};
use api_contract::{AnalyzerDto, ApiResponse, StatusEventRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{AnalyzerStatus, LifecycleEvent};
use lis_ingest::now_epoch_ms;
use lis_storage::AnalyzerStore;

pub async fn list_analyzers(State(state): State<AppState>) -> Response {
    match state.stores.analyzers.list_analyzers().await {
        Ok(items) => {
            let data: Vec<AnalyzerDto> = items.into_iter().map(analyzer_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn get_analyzer(
    State(state): State<AppState>,
    Path(path): Path<AnalyzerPath>,
) -> Response {
    match state.stores.analyzers.find_analyzer(&path.analyzer_id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(ApiResponse::success(analyzer_to_dto(record))),
        )
            .into_response(),
        Ok(None) => not_found_error(format!("analyzer {} not found", path.analyzer_id)),
        Err(err) => storage_error(err),
    }
}

pub async fn post_status_event(
    State(state): State<AppState>,
    Path(path): Path<AnalyzerPath>,
    Json(req): Json<StatusEventRequest>,
) -> Response {
    let event = match parse_optional::<LifecycleEvent>(req.event.as_deref(), "event") {
        Ok(event) => event,
        Err(response) => return response,
    };
    let target =
        match parse_optional::<AnalyzerStatus>(req.target_status.as_deref(), "targetStatus") {
            Ok(target) => target,
            Err(response) => return response,
        };

    let lifecycle = state.processor.lifecycle();
    let now_ms = now_epoch_ms();
    let result = match (event, target) {
        (Some(event), None) => lifecycle.on_event(&path.analyzer_id, event, now_ms).await,
        (None, Some(target)) => {
            lifecycle
                .transition(&path.analyzer_id, target, now_ms)
                .await
        }
        _ => return bad_request_error("exactly one of event or targetStatus is required"),
    };
    match result {
        Ok(change) => (
            StatusCode::OK,
            Json(ApiResponse::success(status_change_to_dto(change))),
        )
            .into_response(),
        Err(err) => lifecycle_error(err),
    }
}
