//! 映射预览与覆盖率 handlers
//!
//! - POST /analyzers/{id}/mappings/preview - 按当前生效映射演练一条报文，不写入任何数据
//! - GET /analyzers/{id}/mappings/coverage - 字段映射覆盖率与类型兼容性警告

use super::AnalyzerPath;
use crate::AppState;
use crate::utils::response::{coverage_to_dto, preview_to_dto, process_error};
use api_contract::{ApiResponse, MappingPreviewRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn preview_mappings(
    State(state): State<AppState>,
    Path(path): Path<AnalyzerPath>,
    Json(req): Json<MappingPreviewRequest>,
) -> Response {
    match state
        .processor
        .preview(&path.analyzer_id, &req.message)
        .await
    {
        Ok(preview) => (
            StatusCode::OK,
            Json(ApiResponse::success(preview_to_dto(preview))),
        )
            .into_response(),
        Err(err) => process_error(err),
    }
}

pub async fn mapping_coverage(
    State(state): State<AppState>,
    Path(path): Path<AnalyzerPath>,
) -> Response {
    match state.processor.coverage(&path.analyzer_id).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(coverage_to_dto(path.analyzer_id, report))),
        )
            .into_response(),
        Err(err) => process_error(err),
    }
}
