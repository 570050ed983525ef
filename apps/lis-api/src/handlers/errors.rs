//! 错误看板 handlers
//!
//! - GET /analyzer-errors - 按仪器/类型/严重级别/状态/时间过滤
//! - GET /analyzer-errors/statistics - 总数、未确认、严重、最近 24 小时
//! - GET /analyzer-errors/{id} - 错误详情（含原始报文）
//! - POST /analyzer-errors/{id}/acknowledge - 确认（需 userId）
//! - POST /analyzer-errors/batch-acknowledge - 批量确认，返回未找到的 ID
//! - POST /analyzer-errors/{id}/resolve - 标记已解决
//! - POST /analyzer-errors/{id}/reprocess - 用保存的原始报文重新处理

use super::ErrorPath;
use crate::AppState;
use crate::utils::response::{error_service_error, error_to_dto, outcome_to_dto, process_error};
use crate::utils::{normalize_required, parse_optional};
use api_contract::{
    AcknowledgeRequest, AnalyzerErrorDto, ApiResponse, BatchAcknowledgeDto,
    BatchAcknowledgeRequest, ErrorListQuery, ErrorStatisticsDto, ReprocessDto,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{ErrorStatus, ErrorType, Severity};
use lis_ingest::now_epoch_ms;
use lis_storage::ErrorFilter;

pub async fn list_errors(
    State(state): State<AppState>,
    Query(query): Query<ErrorListQuery>,
) -> Response {
    let filter = match error_filter(query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    match state.processor.errors().list(&filter).await {
        Ok(items) => {
            let data: Vec<AnalyzerErrorDto> = items.into_iter().map(error_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => error_service_error(err),
    }
}

pub async fn error_statistics(State(state): State<AppState>) -> Response {
    match state.processor.errors().statistics(now_epoch_ms()).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(ApiResponse::success(ErrorStatisticsDto {
                total_errors: stats.total_errors,
                unacknowledged: stats.unacknowledged,
                critical: stats.critical,
                last_24_hours: stats.last_24_hours,
            })),
        )
            .into_response(),
        Err(err) => error_service_error(err),
    }
}

pub async fn get_error(State(state): State<AppState>, Path(path): Path<ErrorPath>) -> Response {
    match state.processor.errors().get(&path.error_id).await {
        Ok(record) => ok_error(record),
        Err(err) => error_service_error(err),
    }
}

pub async fn acknowledge_error(
    State(state): State<AppState>,
    Path(path): Path<ErrorPath>,
    Json(req): Json<AcknowledgeRequest>,
) -> Response {
    let user_id = match normalize_required(&req.user_id, "userId") {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match state
        .processor
        .errors()
        .acknowledge(&path.error_id, &user_id)
        .await
    {
        Ok(record) => ok_error(record),
        Err(err) => error_service_error(err),
    }
}

pub async fn batch_acknowledge_errors(
    State(state): State<AppState>,
    Json(req): Json<BatchAcknowledgeRequest>,
) -> Response {
    let user_id = match normalize_required(&req.user_id, "userId") {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match state
        .processor
        .errors()
        .batch_acknowledge(&req.error_ids, &user_id)
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(ApiResponse::success(BatchAcknowledgeDto {
                acknowledged: result.acknowledged,
                not_found: result.not_found,
            })),
        )
            .into_response(),
        Err(err) => error_service_error(err),
    }
}

pub async fn resolve_error(State(state): State<AppState>, Path(path): Path<ErrorPath>) -> Response {
    match state.processor.errors().resolve(&path.error_id).await {
        Ok(record) => ok_error(record),
        Err(err) => error_service_error(err),
    }
}

/// 重处理成功时错误记录已被标记为 RESOLVED；失败返回 422，记录保持原状态
pub async fn reprocess_error(
    State(state): State<AppState>,
    Path(path): Path<ErrorPath>,
) -> Response {
    let reprocessed = match state.processor.reprocess(&path.error_id).await {
        Ok(reprocessed) => reprocessed,
        Err(err) => return process_error(err),
    };
    match state.processor.errors().get(&reprocessed.error_id).await {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(ReprocessDto {
                error: error_to_dto(record),
                result: outcome_to_dto(reprocessed.outcome),
            })),
        )
            .into_response(),
        Err(err) => error_service_error(err),
    }
}

fn ok_error(record: lis_storage::AnalyzerErrorRecord) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(error_to_dto(record))),
    )
        .into_response()
}

fn error_filter(query: ErrorListQuery) -> Result<ErrorFilter, Response> {
    Ok(ErrorFilter {
        error_type: parse_optional::<ErrorType>(query.error_type.as_deref(), "errorType")?,
        severity: parse_optional::<Severity>(query.severity.as_deref(), "severity")?,
        status: parse_optional::<ErrorStatus>(query.status.as_deref(), "status")?,
        analyzer_id: query.analyzer_id.filter(|id| !id.trim().is_empty()),
        created_from_ms: query.created_from,
        created_to_ms: query.created_to,
        limit: query.limit,
    })
}
