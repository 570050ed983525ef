//! 数据模型
//!
//! 定义所有存储相关的数据结构：
//! - 仪器与仪器类型：AnalyzerRecord, AnalyzerTypeRecord
//! - 字段与映射：AnalyzerFieldRecord, FieldMappingRecord, ActiveFieldMapping
//! - 值/单位映射：QualitativeMappingRecord, UnitMappingRecord
//! - 自定义字段类型与校验规则：CustomFieldTypeRecord, ValidationRuleRecord
//! - 错误记录：AnalyzerErrorRecord, AnalyzerErrorUpdate, ErrorFilter, ErrorStatistics
//! - 结果与质控：AnalyzerResultRecord, QcResultRecord
//! - 传输配置：FileImportConfigRecord, SerialPortConfigRecord

use domain::{
    AnalyzerStatus, ControlLevel, ErrorStatus, ErrorType, FieldType, FlowControl, MappingTarget,
    MappingType, Parity, ProtocolVersion, RuleType, Severity, StopBits,
};

/// 仪器类型（插件能力定义）。
#[derive(Debug, Clone)]
pub struct AnalyzerTypeRecord {
    pub type_id: String,
    pub name: String,
    pub protocol: String,
    /// 插件名（GenericASTM / GenericHL7 / GenericFile 或具体插件名）。
    pub plugin_name: String,
    pub identifier_pattern: Option<String>,
    pub generic_plugin: bool,
    pub active: bool,
    /// 插件注册顺序。
    pub sort_order: i32,
}

/// 仪器实例。
#[derive(Debug, Clone)]
pub struct AnalyzerRecord {
    pub analyzer_id: String,
    pub name: String,
    pub machine_id: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub analyzer_type_id: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i32>,
    pub protocol_version: ProtocolVersion,
    pub status: AnalyzerStatus,
    pub identifier_pattern: Option<String>,
    pub last_activated_ms: Option<i64>,
}

impl AnalyzerRecord {
    /// 以默认协议与 SETUP 状态构造仪器记录。
    pub fn new(analyzer_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            name: name.into(),
            machine_id: None,
            description: None,
            location: None,
            analyzer_type_id: None,
            ip_address: None,
            port: None,
            protocol_version: ProtocolVersion::default(),
            status: AnalyzerStatus::default(),
            identifier_pattern: None,
            last_activated_ms: None,
        }
    }
}

/// 仪器可上报的字段/代码。
#[derive(Debug, Clone)]
pub struct AnalyzerFieldRecord {
    pub field_id: String,
    pub analyzer_id: String,
    pub field_name: String,
    pub astm_ref: Option<String>,
    pub field_type: FieldType,
    pub unit: Option<String>,
    pub custom_field_type_id: Option<String>,
    pub active: bool,
}

/// 字段映射。
#[derive(Debug, Clone)]
pub struct FieldMappingRecord {
    pub mapping_id: String,
    pub analyzer_id: String,
    pub analyzer_field_id: String,
    pub target: MappingTarget,
    pub mapping_type: MappingType,
    pub required: bool,
    pub active: bool,
    pub specimen_type_constraint: Option<String>,
    pub panel_constraint: Option<String>,
    pub version: i64,
}

/// 生效映射及其字段（映射引擎的输入）。
#[derive(Debug, Clone)]
pub struct ActiveFieldMapping {
    pub mapping: FieldMappingRecord,
    pub field: AnalyzerFieldRecord,
}

/// 定性结果映射：仪器值 -> 标准代码。
#[derive(Debug, Clone)]
pub struct QualitativeMappingRecord {
    pub mapping_id: String,
    pub analyzer_field_id: String,
    pub analyzer_value: String,
    pub canonical_code: String,
    pub is_default: bool,
}

/// 单位映射。
#[derive(Debug, Clone)]
pub struct UnitMappingRecord {
    pub mapping_id: String,
    pub analyzer_field_id: String,
    pub analyzer_unit: String,
    pub canonical_unit: String,
    pub conversion_factor: Option<f64>,
    pub reject_if_mismatch: bool,
}

/// 自定义字段类型。
#[derive(Debug, Clone)]
pub struct CustomFieldTypeRecord {
    pub type_id: String,
    pub type_name: String,
    pub display_name: String,
    pub validation_pattern: Option<String>,
    pub value_range_min: Option<f64>,
    pub value_range_max: Option<f64>,
    pub allowed_characters: Option<String>,
    pub active: bool,
}

/// 自定义字段类型上的校验规则。
#[derive(Debug, Clone)]
pub struct ValidationRuleRecord {
    pub rule_id: String,
    pub custom_field_type_id: String,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub rule_expression: String,
    pub error_message: Option<String>,
    pub active: bool,
}

/// 仪器错误记录（仅追加，不删除）。
#[derive(Debug, Clone)]
pub struct AnalyzerErrorRecord {
    pub error_id: String,
    pub analyzer_id: Option<String>,
    pub error_type: ErrorType,
    pub severity: Severity,
    pub error_message: String,
    pub raw_message: String,
    pub status: ErrorStatus,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at_ms: Option<i64>,
    pub resolved_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

/// 错误记录状态更新（仅覆盖 Some 字段）。
#[derive(Debug, Clone, Default)]
pub struct AnalyzerErrorUpdate {
    pub status: Option<ErrorStatus>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at_ms: Option<i64>,
    pub resolved_at_ms: Option<i64>,
}

/// 错误列表过滤条件。
#[derive(Debug, Clone, Default)]
pub struct ErrorFilter {
    pub analyzer_id: Option<String>,
    pub error_type: Option<ErrorType>,
    pub severity: Option<Severity>,
    pub status: Option<ErrorStatus>,
    pub created_from_ms: Option<i64>,
    pub created_to_ms: Option<i64>,
    pub limit: Option<i64>,
}

impl ErrorFilter {
    pub fn matches(&self, record: &AnalyzerErrorRecord) -> bool {
        if let Some(analyzer_id) = self.analyzer_id.as_deref() {
            if record.analyzer_id.as_deref() != Some(analyzer_id) {
                return false;
            }
        }
        if self.error_type.is_some_and(|value| value != record.error_type) {
            return false;
        }
        if self.severity.is_some_and(|value| value != record.severity) {
            return false;
        }
        if self.status.is_some_and(|value| value != record.status) {
            return false;
        }
        if self.created_from_ms.is_some_and(|from| record.created_at_ms < from) {
            return false;
        }
        if self.created_to_ms.is_some_and(|to| record.created_at_ms > to) {
            return false;
        }
        true
    }
}

/// 错误看板统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorStatistics {
    pub total_errors: i64,
    pub unacknowledged: i64,
    pub critical: i64,
    pub last_24_hours: i64,
}

/// 已入库的检验结果。
#[derive(Debug, Clone)]
pub struct AnalyzerResultRecord {
    pub result_id: String,
    pub analyzer_id: Option<String>,
    pub sample_id: String,
    pub test_code: String,
    pub value: String,
    pub units: Option<String>,
    pub tested_at_ms: Option<i64>,
    pub raw_line: String,
    pub inserted_by: String,
    pub created_at_ms: i64,
}

/// 质控结果。
#[derive(Debug, Clone)]
pub struct QcResultRecord {
    pub qc_result_id: String,
    pub analyzer_id: String,
    pub instrument_id: Option<String>,
    pub test_id: String,
    pub control_lot_id: String,
    pub control_level: ControlLevel,
    pub value: f64,
    pub unit: String,
    pub measured_at_ms: i64,
    pub created_at_ms: i64,
}

/// CSV 列 -> 内部字段名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub column: String,
    pub field: String,
}

/// 文件导入配置。
#[derive(Debug, Clone)]
pub struct FileImportConfigRecord {
    pub config_id: String,
    pub analyzer_id: String,
    pub import_directory: String,
    pub file_pattern: String,
    pub archive_directory: Option<String>,
    pub error_directory: Option<String>,
    /// 按配置顺序保存的列映射。
    pub column_mappings: Vec<ColumnMapping>,
    pub delimiter: char,
    pub has_header: bool,
    pub active: bool,
}

impl FileImportConfigRecord {
    pub fn new(
        config_id: impl Into<String>,
        analyzer_id: impl Into<String>,
        import_directory: impl Into<String>,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            analyzer_id: analyzer_id.into(),
            import_directory: import_directory.into(),
            file_pattern: "*.csv".to_string(),
            archive_directory: None,
            error_directory: None,
            column_mappings: Vec::new(),
            delimiter: ',',
            has_header: true,
            active: true,
        }
    }
}

/// 串口配置。
#[derive(Debug, Clone)]
pub struct SerialPortConfigRecord {
    pub config_id: String,
    pub analyzer_id: String,
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub active: bool,
}

impl SerialPortConfigRecord {
    /// 默认 9600 8N1、无流控。
    pub fn new(
        config_id: impl Into<String>,
        analyzer_id: impl Into<String>,
        port_name: impl Into<String>,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            analyzer_id: analyzer_id.into(),
            port_name: port_name.into(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            active: true,
        }
    }
}
