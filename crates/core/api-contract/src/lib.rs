//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// 失败时生成的仪器错误记录，可用于重处理。
    #[serde(rename = "errorId", skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
                error_id: None,
            }),
        }
    }

    /// 附带错误记录 ID。
    pub fn with_error_id(mut self, error_id: Option<String>) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.error_id = error_id;
        }
        self
    }
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub storage: String,
}

/// 仪器返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerDto {
    pub analyzer_id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub analyzer_type_id: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i32>,
    pub protocol_version: String,
    pub status: String,
    pub identifier_pattern: Option<String>,
    pub last_activated_at: Option<i64>,
}

/// 仪器状态事件请求体。
///
/// `event` 为生命周期事件（如 `CONNECTION_TEST_FAILED`），`targetStatus` 为显式迁移，二选一。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEventRequest {
    pub event: Option<String>,
    #[serde(alias = "target_status")]
    pub target_status: Option<String>,
}

/// 状态迁移结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeDto {
    pub analyzer_id: String,
    pub previous_status: String,
    pub status: String,
    pub changed: bool,
}

/// 报文处理结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResultDto {
    /// INSERTED / RESPONDED / REJECTED / IGNORED。
    pub outcome: String,
    pub analyzer_id: Option<String>,
    pub plugin_name: Option<String>,
    pub inserted: usize,
    pub duplicates: usize,
    pub unmapped_fields: Vec<String>,
    pub warnings: Vec<String>,
    /// 查询应答报文行（ASTM 查询应答或 HL7 ACK）。
    pub response: Vec<String>,
}

/// 仪器错误返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerErrorDto {
    pub error_id: String,
    pub analyzer_id: Option<String>,
    pub error_type: String,
    pub severity: String,
    pub error_message: String,
    pub raw_message: String,
    pub status: String,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<i64>,
    pub resolved_at: Option<i64>,
    pub created_at: i64,
}

/// 错误列表查询参数。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorListQuery {
    pub analyzer_id: Option<String>,
    pub error_type: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub created_from: Option<i64>,
    pub created_to: Option<i64>,
    pub limit: Option<i64>,
}

/// 错误看板统计。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStatisticsDto {
    pub total_errors: i64,
    pub unacknowledged: i64,
    pub critical: i64,
    pub last_24_hours: i64,
}

/// 确认请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    #[serde(alias = "user_id")]
    pub user_id: String,
}

/// 批量确认请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAcknowledgeRequest {
    #[serde(alias = "error_ids")]
    pub error_ids: Vec<String>,
    #[serde(alias = "user_id")]
    pub user_id: String,
}

/// 批量确认结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAcknowledgeDto {
    pub acknowledged: Vec<String>,
    pub not_found: Vec<String>,
}

/// 重处理结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessDto {
    pub error: AnalyzerErrorDto,
    pub result: ProcessResultDto,
}

/// 映射预览请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPreviewRequest {
    pub message: String,
}

/// 预览中解析出的字段。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFieldDto {
    pub field_name: String,
    pub value: String,
    pub units: Option<String>,
    pub sample_id: Option<String>,
}

/// 预览中命中的映射。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMappingDto {
    pub field_name: String,
    pub target_type: String,
    pub target_id: String,
    pub raw_value: String,
    pub mapped_value: String,
    pub raw_unit: Option<String>,
    pub mapped_unit: Option<String>,
}

/// 预览将生成的结果实体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPreviewDto {
    pub sample_id: Option<String>,
    pub test_code: String,
    pub value: String,
    pub units: Option<String>,
}

/// 映射预览返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPreviewDto {
    pub parsed_fields: Vec<ParsedFieldDto>,
    pub applied_mappings: Vec<AppliedMappingDto>,
    pub entity_preview: Vec<EntityPreviewDto>,
    pub unmapped_fields: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// 按单位统计的覆盖率。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCoverageDto {
    pub unit: String,
    pub total_fields: usize,
    pub mapped_fields: usize,
}

/// 映射覆盖率返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCoverageDto {
    pub analyzer_id: String,
    pub total_fields: usize,
    pub mapped_fields: usize,
    pub required_mappings: usize,
    /// 已映射字段占比（0-100）。
    pub accuracy: f64,
    pub unmapped_fields: Vec<String>,
    pub type_warnings: Vec<String>,
    pub coverage_by_unit: Vec<UnitCoverageDto>,
}

/// 接入计数器快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
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
