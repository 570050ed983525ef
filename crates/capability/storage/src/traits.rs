//! 存储接口 Trait 定义
//!
//! 定义所有资源存储的异步接口：
//! - AnalyzerStore：仪器与仪器类型
//! - MappingStore：字段、映射、定性/单位映射、自定义类型与校验规则
//! - AnalyzerErrorStore：错误记录
//! - ResultStore：检验结果与质控结果
//! - TransportConfigStore：文件导入与串口配置
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{
    ActiveFieldMapping, AnalyzerErrorRecord, AnalyzerErrorUpdate, AnalyzerFieldRecord,
    AnalyzerRecord, AnalyzerResultRecord, AnalyzerTypeRecord, CustomFieldTypeRecord, ErrorFilter,
    ErrorStatistics, FieldMappingRecord, FileImportConfigRecord, QcResultRecord,
    QualitativeMappingRecord, SerialPortConfigRecord, UnitMappingRecord, ValidationRuleRecord,
};
use async_trait::async_trait;
use domain::AnalyzerStatus;

/// 仪器存储接口
#[async_trait]
pub trait AnalyzerStore: Send + Sync {
    /// 列出所有仪器
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerRecord>, StorageError>;

    /// 查找指定仪器
    async fn find_analyzer(&self, analyzer_id: &str)
    -> Result<Option<AnalyzerRecord>, StorageError>;

    /// 按名称查找（忽略大小写与首尾空格）
    async fn find_analyzer_by_name(
        &self,
        name: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError>;

    /// 按配置的 IP 地址查找
    async fn find_analyzer_by_ip(
        &self,
        ip_address: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError>;

    /// 新建或覆盖仪器
    async fn upsert_analyzer(&self, record: AnalyzerRecord) -> Result<AnalyzerRecord, StorageError>;

    /// 更新状态；`last_activated_ms` 为 Some 时一并写入
    async fn update_analyzer_status(
        &self,
        analyzer_id: &str,
        status: AnalyzerStatus,
        last_activated_ms: Option<i64>,
    ) -> Result<Option<AnalyzerRecord>, StorageError>;

    /// 按注册顺序列出仪器类型
    async fn list_analyzer_types(&self) -> Result<Vec<AnalyzerTypeRecord>, StorageError>;

    /// 查找仪器类型
    async fn find_analyzer_type(
        &self,
        type_id: &str,
    ) -> Result<Option<AnalyzerTypeRecord>, StorageError>;

    /// 新建或覆盖仪器类型
    async fn upsert_analyzer_type(
        &self,
        record: AnalyzerTypeRecord,
    ) -> Result<AnalyzerTypeRecord, StorageError>;
}

/// 映射配置存储接口
///
/// 映射引擎只读取 `active = true` 的映射。
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// 列出仪器的生效映射（含字段）
    async fn list_active_mappings(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<ActiveFieldMapping>, StorageError>;

    /// 列出仪器的字段
    async fn list_fields(&self, analyzer_id: &str)
    -> Result<Vec<AnalyzerFieldRecord>, StorageError>;

    /// 按字段名查找
    async fn find_field_by_name(
        &self,
        analyzer_id: &str,
        field_name: &str,
    ) -> Result<Option<AnalyzerFieldRecord>, StorageError>;

    /// 列出仪器的全部映射（含草稿）
    async fn list_mappings(&self, analyzer_id: &str)
    -> Result<Vec<FieldMappingRecord>, StorageError>;

    /// 列出字段的定性结果映射
    async fn list_qualitative_mappings(
        &self,
        field_id: &str,
    ) -> Result<Vec<QualitativeMappingRecord>, StorageError>;

    /// 列出字段的单位映射
    async fn list_unit_mappings(&self, field_id: &str)
    -> Result<Vec<UnitMappingRecord>, StorageError>;

    /// 查找自定义字段类型
    async fn find_custom_field_type(
        &self,
        type_id: &str,
    ) -> Result<Option<CustomFieldTypeRecord>, StorageError>;

    /// 列出自定义字段类型的生效校验规则
    async fn list_validation_rules(
        &self,
        custom_field_type_id: &str,
    ) -> Result<Vec<ValidationRuleRecord>, StorageError>;

    async fn upsert_field(
        &self,
        record: AnalyzerFieldRecord,
    ) -> Result<AnalyzerFieldRecord, StorageError>;

    async fn upsert_mapping(
        &self,
        record: FieldMappingRecord,
    ) -> Result<FieldMappingRecord, StorageError>;

    async fn upsert_qualitative_mapping(
        &self,
        record: QualitativeMappingRecord,
    ) -> Result<QualitativeMappingRecord, StorageError>;

    async fn upsert_unit_mapping(
        &self,
        record: UnitMappingRecord,
    ) -> Result<UnitMappingRecord, StorageError>;

    async fn upsert_custom_field_type(
        &self,
        record: CustomFieldTypeRecord,
    ) -> Result<CustomFieldTypeRecord, StorageError>;

    async fn upsert_validation_rule(
        &self,
        record: ValidationRuleRecord,
    ) -> Result<ValidationRuleRecord, StorageError>;

    /// 激活/停用映射
    async fn set_mapping_active(&self, mapping_id: &str, active: bool)
    -> Result<bool, StorageError>;
}

/// 仪器错误存储接口（仅追加，无删除）
#[async_trait]
pub trait AnalyzerErrorStore: Send + Sync {
    async fn insert_error(
        &self,
        record: AnalyzerErrorRecord,
    ) -> Result<AnalyzerErrorRecord, StorageError>;

    async fn find_error(&self, error_id: &str)
    -> Result<Option<AnalyzerErrorRecord>, StorageError>;

    async fn update_error(
        &self,
        error_id: &str,
        update: AnalyzerErrorUpdate,
    ) -> Result<Option<AnalyzerErrorRecord>, StorageError>;

    /// 按条件列出（新记录在前）
    async fn list_errors(
        &self,
        filter: &ErrorFilter,
    ) -> Result<Vec<AnalyzerErrorRecord>, StorageError>;

    /// 统计仪器未确认错误数
    async fn count_unacknowledged(&self, analyzer_id: &str) -> Result<i64, StorageError>;

    /// 全局统计（last_24_hours 以 now_ms 为基准）
    async fn error_statistics(&self, now_ms: i64) -> Result<ErrorStatistics, StorageError>;
}

/// 检验结果存储接口
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 写入一批结果，返回写入条数
    async fn insert_results(&self, records: &[AnalyzerResultRecord]) -> Result<usize, StorageError>;

    /// 按（仪器、样本、检测代码、检测时间）判断是否已存在
    async fn find_duplicate(
        &self,
        analyzer_id: &str,
        sample_id: &str,
        test_code: &str,
        tested_at_ms: i64,
    ) -> Result<bool, StorageError>;

    async fn list_results(
        &self,
        analyzer_id: Option<&str>,
    ) -> Result<Vec<AnalyzerResultRecord>, StorageError>;

    async fn insert_qc_result(&self, record: QcResultRecord) -> Result<QcResultRecord, StorageError>;

    async fn list_qc_results(&self, analyzer_id: &str)
    -> Result<Vec<QcResultRecord>, StorageError>;
}

/// 传输配置存储接口
#[async_trait]
pub trait TransportConfigStore: Send + Sync {
    async fn list_file_import_configs(&self)
    -> Result<Vec<FileImportConfigRecord>, StorageError>;

    async fn find_file_import_config(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<FileImportConfigRecord>, StorageError>;

    async fn upsert_file_import_config(
        &self,
        record: FileImportConfigRecord,
    ) -> Result<FileImportConfigRecord, StorageError>;

    async fn list_serial_configs(&self) -> Result<Vec<SerialPortConfigRecord>, StorageError>;

    async fn find_serial_config(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<SerialPortConfigRecord>, StorageError>;

    async fn upsert_serial_config(
        &self,
        record: SerialPortConfigRecord,
    ) -> Result<SerialPortConfigRecord, StorageError>;
}
