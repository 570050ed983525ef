//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, storage_error, process_error 等
//! - DTO 转换：analyzer_to_dto, error_to_dto, outcome_to_dto, preview_to_dto, coverage_to_dto
//!
//! 所有错误返回统一的 ApiResponse 格式；处理失败为 422，未知 ID 为 404，存储失败为 500。

use api_contract::{
    AnalyzerDto, AnalyzerErrorDto, ApiResponse, AppliedMappingDto, EntityPreviewDto,
    MappingCoverageDto, MappingPreviewDto, ParsedFieldDto, ProcessResultDto, StatusChangeDto,
    UnitCoverageDto,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lis_normalize::{CoverageReport, MappingError, MappingPreview};
use lis_pipeline::{ErrorServiceError, LifecycleError, ProcessError, ProcessOutcome, StatusChange};
use lis_storage::{AnalyzerErrorRecord, AnalyzerRecord, StorageError};
use tracing::warn;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", message)
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    internal_error(err.to_string())
}

fn internal_error(message: String) -> Response {
    warn!(target: "lis.api", error = %message, "request_failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR", message)
}

/// 流水线错误响应，带上失败时生成的错误记录 ID
pub fn process_error(err: ProcessError) -> Response {
    let error_id = err.error_id().map(str::to_string);
    let (status, code) = match &err {
        ProcessError::NotFound(message) => return not_found_error(message.clone()),
        ProcessError::Storage(message) => return internal_error(message.clone()),
        ProcessError::Mapping(MappingError::Provider(message)) => {
            return internal_error(message.clone());
        }
        ProcessError::Mapping(MappingError::PreviewTooLarge { .. }) => {
            (StatusCode::PAYLOAD_TOO_LARGE, "PREVIEW.TOO_LARGE")
        }
        ProcessError::Read { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "MESSAGE.READ_FAILED"),
        ProcessError::NoPluginMatched { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "PLUGIN.NO_MATCH"),
        ProcessError::AnalyzerInactive { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "ANALYZER.INACTIVE")
        }
        ProcessError::MappingRejected { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "MAPPING.REJECTED"),
        ProcessError::Insert { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "RESULT.INSERT_FAILED"),
        ProcessError::Mapping(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MAPPING.ERROR"),
        ProcessError::Reprocess(_) => (StatusCode::UNPROCESSABLE_ENTITY, "REPROCESS.FAILED"),
    };
    (
        status,
        Json(ApiResponse::<()>::error(code, err.to_string()).with_error_id(error_id)),
    )
        .into_response()
}

/// 错误服务的失败响应
pub fn error_service_error(err: ErrorServiceError) -> Response {
    match err {
        ErrorServiceError::NotFound(error_id) => {
            not_found_error(format!("analyzer error {error_id} not found"))
        }
        ErrorServiceError::Invalid(message) => bad_request_error(message),
        ErrorServiceError::Storage(message) => internal_error(message),
    }
}

/// 状态迁移的失败响应；非法迁移为 409
pub fn lifecycle_error(err: LifecycleError) -> Response {
    match err {
        LifecycleError::NotFound(analyzer_id) => {
            not_found_error(format!("analyzer {analyzer_id} not found"))
        }
        LifecycleError::IllegalTransition { .. } => error_response(
            StatusCode::CONFLICT,
            "ANALYZER.ILLEGAL_TRANSITION",
            err.to_string(),
        ),
        LifecycleError::Storage(message) => internal_error(message),
    }
}

pub fn analyzer_to_dto(record: AnalyzerRecord) -> AnalyzerDto {
    AnalyzerDto {
        analyzer_id: record.analyzer_id,
        name: record.name,
        description: record.description,
        location: record.location,
        analyzer_type_id: record.analyzer_type_id,
        ip_address: record.ip_address,
        port: record.port,
        protocol_version: record.protocol_version.as_str().to_string(),
        status: record.status.as_str().to_string(),
        identifier_pattern: record.identifier_pattern,
        last_activated_at: record.last_activated_ms,
    }
}

pub fn error_to_dto(record: AnalyzerErrorRecord) -> AnalyzerErrorDto {
    AnalyzerErrorDto {
        error_id: record.error_id,
        analyzer_id: record.analyzer_id,
        error_type: record.error_type.as_str().to_string(),
        severity: record.severity.as_str().to_string(),
        error_message: record.error_message,
        raw_message: record.raw_message,
        status: record.status.as_str().to_string(),
        acknowledged_by: record.acknowledged_by,
        acknowledged_at: record.acknowledged_at_ms,
        resolved_at: record.resolved_at_ms,
        created_at: record.created_at_ms,
    }
}

pub fn status_change_to_dto(change: StatusChange) -> StatusChangeDto {
    StatusChangeDto {
        analyzer_id: change.analyzer_id,
        previous_status: change.previous.as_str().to_string(),
        status: change.status.as_str().to_string(),
        changed: change.changed,
    }
}

pub fn outcome_to_dto(outcome: ProcessOutcome) -> ProcessResultDto {
    ProcessResultDto {
        outcome: outcome.status.as_str().to_string(),
        analyzer_id: outcome.analyzer_id,
        plugin_name: Some(outcome.plugin),
        inserted: outcome.inserted,
        duplicates: outcome.duplicates,
        unmapped_fields: outcome.unmapped_fields,
        warnings: outcome.warnings,
        response: outcome.response.unwrap_or_default(),
    }
}

pub fn preview_to_dto(preview: MappingPreview) -> MappingPreviewDto {
    let parsed_fields = preview
        .parsed_fields
        .into_iter()
        .map(|field| ParsedFieldDto {
            field_name: field.code,
            value: field.value,
            units: field.units,
            sample_id: field.sample_id,
        })
        .collect();
    let entity_preview = preview
        .entities
        .into_iter()
        .map(|field| EntityPreviewDto {
            sample_id: field.sample_id,
            test_code: field.code,
            value: field.value,
            units: field.units,
        })
        .collect();
    let outcome = preview.outcome;
    let applied_mappings = outcome
        .applied
        .into_iter()
        .map(|applied| AppliedMappingDto {
            field_name: applied.field_name,
            target_type: applied.target.kind().as_str().to_string(),
            target_id: applied.target.id().to_string(),
            raw_value: applied.raw_value,
            mapped_value: applied.mapped_value,
            raw_unit: applied.raw_unit,
            mapped_unit: applied.mapped_unit,
        })
        .collect();
    MappingPreviewDto {
        parsed_fields,
        applied_mappings,
        entity_preview,
        unmapped_fields: outcome.unmapped_fields,
        warnings: outcome.warnings,
        errors: outcome.errors,
    }
}

pub fn coverage_to_dto(analyzer_id: String, report: CoverageReport) -> MappingCoverageDto {
    MappingCoverageDto {
        analyzer_id,
        total_fields: report.total_fields,
        mapped_fields: report.mapped_fields,
        required_mappings: report.required_mappings,
        accuracy: report.accuracy,
        unmapped_fields: report.unmapped_fields,
        type_warnings: report.type_warnings,
        coverage_by_unit: report
            .by_unit
            .into_iter()
            .map(|unit| UnitCoverageDto {
                unit: unit.unit,
                total_fields: unit.total_fields,
                mapped_fields: unit.mapped_fields,
            })
            .collect(),
    }
}
