//! 种子数据加载
//!
//! 启动时从 `LIS_SEED_FILE` 读取 JSON，把仪器类型、仪器、字段、映射与传输配置写入存储。
//! 写入前做与配置界面相同的一致性检查（定性映射唯一性、单位换算系数、串口参数）。

use domain::{
    AnalyzerStatus, FieldType, FlowControl, MappingTarget, MappingType, Parity, ProtocolVersion,
    RuleType, StopBits, TargetKind,
};
use lis_ingest::serial_settings;
use lis_normalize::{check_qualitative_mappings, check_unit_mapping};
use lis_pipeline::PipelineStores;
use lis_storage::{
    AnalyzerFieldRecord, AnalyzerRecord, AnalyzerStore, AnalyzerTypeRecord, ColumnMapping,
    CustomFieldTypeRecord, FieldMappingRecord, FileImportConfigRecord, QualitativeMappingRecord,
    MappingStore, SerialPortConfigRecord, StorageError, TransportConfigStore, UnitMappingRecord,
    ValidationRuleRecord,
};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("read seed file failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid seed entry: {0}")]
    Invalid(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedFile {
    pub analyzer_types: Vec<SeedAnalyzerType>,
    pub analyzers: Vec<SeedAnalyzer>,
    pub custom_field_types: Vec<SeedCustomFieldType>,
    pub validation_rules: Vec<SeedValidationRule>,
    pub fields: Vec<SeedField>,
    pub mappings: Vec<SeedMapping>,
    pub qualitative_mappings: Vec<SeedQualitativeMapping>,
    pub unit_mappings: Vec<SeedUnitMapping>,
    pub file_imports: Vec<SeedFileImport>,
    pub serial_ports: Vec<SeedSerialPort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedAnalyzerType {
    pub type_id: String,
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    pub plugin_name: String,
    pub identifier_pattern: Option<String>,
    #[serde(default = "enabled")]
    pub generic_plugin: bool,
    #[serde(default = "enabled")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedAnalyzer {
    pub analyzer_id: String,
    pub name: String,
    pub machine_id: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub analyzer_type_id: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i32>,
    pub protocol_version: Option<String>,
    pub status: Option<String>,
    pub identifier_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedCustomFieldType {
    pub type_id: String,
    pub type_name: String,
    pub display_name: Option<String>,
    pub validation_pattern: Option<String>,
    pub value_range_min: Option<f64>,
    pub value_range_max: Option<f64>,
    pub allowed_characters: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedValidationRule {
    pub rule_id: String,
    pub custom_field_type_id: String,
    pub rule_name: String,
    pub rule_type: String,
    pub rule_expression: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedField {
    pub field_id: String,
    pub analyzer_id: String,
    pub field_name: String,
    pub astm_ref: Option<String>,
    pub field_type: String,
    pub unit: Option<String>,
    pub custom_field_type_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedMapping {
    pub mapping_id: String,
    pub analyzer_id: String,
    pub analyzer_field_id: String,
    pub target_type: String,
    pub target_id: String,
    pub mapping_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "enabled")]
    pub active: bool,
    pub specimen_type_constraint: Option<String>,
    pub panel_constraint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedQualitativeMapping {
    pub mapping_id: String,
    pub analyzer_field_id: String,
    pub analyzer_value: String,
    pub canonical_code: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUnitMapping {
    pub mapping_id: String,
    pub analyzer_field_id: String,
    pub analyzer_unit: String,
    pub canonical_unit: String,
    pub conversion_factor: Option<f64>,
    #[serde(default)]
    pub reject_if_mismatch: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedColumn {
    pub column: String,
    pub field: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFileImport {
    pub config_id: String,
    pub analyzer_id: String,
    pub import_directory: String,
    pub file_pattern: Option<String>,
    pub archive_directory: Option<String>,
    pub error_directory: Option<String>,
    #[serde(default)]
    pub column_mappings: Vec<SeedColumn>,
    pub delimiter: Option<char>,
    #[serde(default = "enabled")]
    pub has_header: bool,
    #[serde(default = "enabled")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSerialPort {
    pub config_id: String,
    pub analyzer_id: String,
    pub port_name: String,
    pub baud_rate: Option<u32>,
    pub data_bits: Option<u8>,
    pub stop_bits: Option<String>,
    pub parity: Option<String>,
    pub flow_control: Option<String>,
    #[serde(default = "enabled")]
    pub active: bool,
}

fn enabled() -> bool {
    true
}

/// 写入条数。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub analyzer_types: usize,
    pub analyzers: usize,
    pub fields: usize,
    pub mappings: usize,
    pub transport_configs: usize,
}

pub async fn load_seed(path: &Path) -> Result<SeedFile, SeedError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_seed(&text)
}

pub fn parse_seed(text: &str) -> Result<SeedFile, SeedError> {
    Ok(serde_json::from_str(text)?)
}

pub async fn apply_seed(seed: &SeedFile, stores: &PipelineStores) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    for item in &seed.analyzer_types {
        stores
            .analyzers
            .upsert_analyzer_type(AnalyzerTypeRecord {
                type_id: item.type_id.clone(),
                name: item.name.clone(),
                protocol: item.protocol.clone(),
                plugin_name: item.plugin_name.clone(),
                identifier_pattern: item.identifier_pattern.clone(),
                generic_plugin: item.generic_plugin,
                active: item.active,
                sort_order: item.sort_order,
            })
            .await?;
        summary.analyzer_types += 1;
    }

    for item in &seed.analyzers {
        let mut record = AnalyzerRecord::new(&item.analyzer_id, &item.name);
        record.machine_id = item.machine_id.clone();
        record.description = item.description.clone();
        record.location = item.location.clone();
        record.analyzer_type_id = item.analyzer_type_id.clone();
        record.ip_address = item.ip_address.clone();
        record.port = item.port;
        record.identifier_pattern = item.identifier_pattern.clone();
        if let Some(version) = parse_opt::<ProtocolVersion>(item.protocol_version.as_deref())? {
            record.protocol_version = version;
        }
        if let Some(status) = parse_opt::<AnalyzerStatus>(item.status.as_deref())? {
            record.status = status;
        }
        stores.analyzers.upsert_analyzer(record).await?;
        summary.analyzers += 1;
    }

    for item in &seed.custom_field_types {
        stores
            .mappings
            .upsert_custom_field_type(CustomFieldTypeRecord {
                type_id: item.type_id.clone(),
                type_name: item.type_name.clone(),
                display_name: item
                    .display_name
                    .clone()
                    .unwrap_or_else(|| item.type_name.clone()),
                validation_pattern: item.validation_pattern.clone(),
                value_range_min: item.value_range_min,
                value_range_max: item.value_range_max,
                allowed_characters: item.allowed_characters.clone(),
                active: true,
            })
            .await?;
    }
    for item in &seed.validation_rules {
        stores
            .mappings
            .upsert_validation_rule(ValidationRuleRecord {
                rule_id: item.rule_id.clone(),
                custom_field_type_id: item.custom_field_type_id.clone(),
                rule_name: item.rule_name.clone(),
                rule_type: parse::<RuleType>(&item.rule_type)?,
                rule_expression: item.rule_expression.clone(),
                error_message: item.error_message.clone(),
                active: true,
            })
            .await?;
    }

    for item in &seed.fields {
        stores
            .mappings
            .upsert_field(AnalyzerFieldRecord {
                field_id: item.field_id.clone(),
                analyzer_id: item.analyzer_id.clone(),
                field_name: item.field_name.clone(),
                astm_ref: item.astm_ref.clone(),
                field_type: parse::<FieldType>(&item.field_type)?,
                unit: item.unit.clone(),
                custom_field_type_id: item.custom_field_type_id.clone(),
                active: true,
            })
            .await?;
        summary.fields += 1;
    }

    for item in &seed.mappings {
        let kind = parse::<TargetKind>(&item.target_type)?;
        let mapping_type = parse_opt::<MappingType>(item.mapping_type.as_deref())?
            .unwrap_or(MappingType::TestLevel);
        stores
            .mappings
            .upsert_mapping(FieldMappingRecord {
                mapping_id: item.mapping_id.clone(),
                analyzer_id: item.analyzer_id.clone(),
                analyzer_field_id: item.analyzer_field_id.clone(),
                target: MappingTarget::new(kind, item.target_id.clone()),
                mapping_type,
                required: item.required,
                active: item.active,
                specimen_type_constraint: item.specimen_type_constraint.clone(),
                panel_constraint: item.panel_constraint.clone(),
                version: 1,
            })
            .await?;
        summary.mappings += 1;
    }

    let qualitative: Vec<QualitativeMappingRecord> = seed
        .qualitative_mappings
        .iter()
        .map(|item| QualitativeMappingRecord {
            mapping_id: item.mapping_id.clone(),
            analyzer_field_id: item.analyzer_field_id.clone(),
            analyzer_value: item.analyzer_value.clone(),
            canonical_code: item.canonical_code.clone(),
            is_default: item.is_default,
        })
        .collect();
    check_qualitative_mappings(&qualitative).map_err(|err| SeedError::Invalid(err.to_string()))?;
    for record in qualitative {
        stores.mappings.upsert_qualitative_mapping(record).await?;
    }

    for item in &seed.unit_mappings {
        let record = UnitMappingRecord {
            mapping_id: item.mapping_id.clone(),
            analyzer_field_id: item.analyzer_field_id.clone(),
            analyzer_unit: item.analyzer_unit.clone(),
            canonical_unit: item.canonical_unit.clone(),
            conversion_factor: item.conversion_factor,
            reject_if_mismatch: item.reject_if_mismatch,
        };
        check_unit_mapping(&record)
            .map_err(|err| SeedError::Invalid(format!("unit mapping {}: {err}", item.mapping_id)))?;
        stores.mappings.upsert_unit_mapping(record).await?;
    }

    for item in &seed.file_imports {
        let mut record = FileImportConfigRecord::new(
            &item.config_id,
            &item.analyzer_id,
            &item.import_directory,
        );
        if let Some(pattern) = item.file_pattern.as_ref() {
            record.file_pattern = pattern.clone();
        }
        record.archive_directory = item.archive_directory.clone();
        record.error_directory = item.error_directory.clone();
        record.column_mappings = item
            .column_mappings
            .iter()
            .map(|column| ColumnMapping {
                column: column.column.clone(),
                field: column.field.clone(),
            })
            .collect();
        if let Some(delimiter) = item.delimiter {
            record.delimiter = delimiter;
        }
        record.has_header = item.has_header;
        record.active = item.active;
        stores
            .transport_configs
            .upsert_file_import_config(record)
            .await?;
        summary.transport_configs += 1;
    }

    for item in &seed.serial_ports {
        let mut record =
            SerialPortConfigRecord::new(&item.config_id, &item.analyzer_id, &item.port_name);
        if let Some(baud_rate) = item.baud_rate {
            record.baud_rate = baud_rate;
        }
        if let Some(data_bits) = item.data_bits {
            record.data_bits = data_bits;
        }
        if let Some(stop_bits) = parse_opt::<StopBits>(item.stop_bits.as_deref())? {
            record.stop_bits = stop_bits;
        }
        if let Some(parity) = parse_opt::<Parity>(item.parity.as_deref())? {
            record.parity = parity;
        }
        if let Some(flow_control) = parse_opt::<FlowControl>(item.flow_control.as_deref())? {
            record.flow_control = flow_control;
        }
        record.active = item.active;
        serial_settings(&record)
            .validate()
            .map_err(|err| SeedError::Invalid(format!("serial port {}: {err}", item.config_id)))?;
        stores.transport_configs.upsert_serial_config(record).await?;
        summary.transport_configs += 1;
    }

    Ok(summary)
}

fn parse<T>(value: &str) -> Result<T, SeedError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| SeedError::Invalid(err.to_string()))
}

fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>, SeedError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map(parse::<T>).transpose()
}
