//! 映射覆盖率：准确率、未映射字段、类型兼容性告警、按单位统计

use domain::{FieldType, TargetKind};
use lis_storage::{AnalyzerFieldRecord, FieldMappingRecord};
use std::collections::{BTreeMap, HashSet};

/// 无单位字段的分组名。
pub const NO_UNIT: &str = "NONE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCoverage {
    pub unit: String,
    pub total_fields: usize,
    pub mapped_fields: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub total_fields: usize,
    pub mapped_fields: usize,
    pub required_mappings: usize,
    /// 已映射字段占比（百分比，保留两位小数）。
    pub accuracy: f64,
    pub unmapped_fields: Vec<String>,
    pub type_warnings: Vec<String>,
    pub by_unit: Vec<UnitCoverage>,
}

/// 字段类型与目标实体类型是否兼容。
pub fn is_compatible(field_type: FieldType, target: TargetKind) -> bool {
    use TargetKind::*;
    match field_type {
        FieldType::Numeric => matches!(target, Test | Result | Panel | Unit),
        FieldType::Qualitative => matches!(target, Test | Result | Panel),
        FieldType::ControlTest => matches!(target, Qc | Test),
        FieldType::MeltingPoint => matches!(target, Test | Result),
        FieldType::DateTime => matches!(target, Metadata | Order | Sample),
        FieldType::Text => !matches!(target, Unit | Qc),
        FieldType::Custom => true,
    }
}

/// 只统计启用字段；字段有一条生效映射即视为已映射。
pub fn coverage(fields: &[AnalyzerFieldRecord], mappings: &[FieldMappingRecord]) -> CoverageReport {
    let fields: Vec<&AnalyzerFieldRecord> = fields.iter().filter(|field| field.active).collect();
    let active: Vec<&FieldMappingRecord> = mappings.iter().filter(|item| item.active).collect();
    let mapped_ids: HashSet<&str> = active
        .iter()
        .map(|item| item.analyzer_field_id.as_str())
        .collect();

    let mut unmapped_fields = Vec::new();
    let mut by_unit: BTreeMap<String, UnitCoverage> = BTreeMap::new();
    for field in &fields {
        let mapped = mapped_ids.contains(field.field_id.as_str());
        if !mapped {
            unmapped_fields.push(field.field_name.clone());
        }
        let unit = field
            .unit
            .as_deref()
            .map(str::trim)
            .filter(|unit| !unit.is_empty())
            .unwrap_or(NO_UNIT)
            .to_string();
        let entry = by_unit.entry(unit.clone()).or_insert(UnitCoverage {
            unit,
            total_fields: 0,
            mapped_fields: 0,
        });
        entry.total_fields += 1;
        if mapped {
            entry.mapped_fields += 1;
        }
    }

    let mut type_warnings = Vec::new();
    for mapping in &active {
        let Some(field) = fields
            .iter()
            .find(|field| field.field_id == mapping.analyzer_field_id)
        else {
            continue;
        };
        let target = mapping.target.kind();
        if !is_compatible(field.field_type, target) {
            type_warnings.push(format!(
                "{} ({}) is mapped to incompatible target {}",
                field.field_name, field.field_type, target
            ));
        }
    }

    let total_fields = fields.len();
    let mapped_fields = total_fields - unmapped_fields.len();
    let accuracy = if total_fields == 0 {
        0.0
    } else {
        (mapped_fields as f64 * 10_000.0 / total_fields as f64).round() / 100.0
    };

    CoverageReport {
        total_fields,
        mapped_fields,
        required_mappings: active.iter().filter(|item| item.required).count(),
        accuracy,
        unmapped_fields,
        type_warnings,
        by_unit: by_unit.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{MappingTarget, MappingType};

    fn field(id: &str, field_type: FieldType, unit: Option<&str>) -> AnalyzerFieldRecord {
        AnalyzerFieldRecord {
            field_id: id.to_string(),
            analyzer_id: "analyzer-1".to_string(),
            field_name: id.to_uppercase(),
            astm_ref: None,
            field_type,
            unit: unit.map(str::to_string),
            custom_field_type_id: None,
            active: true,
        }
    }

    fn mapping(field_id: &str, target: MappingTarget, active: bool) -> FieldMappingRecord {
        FieldMappingRecord {
            mapping_id: format!("m-{field_id}"),
            analyzer_id: "analyzer-1".to_string(),
            analyzer_field_id: field_id.to_string(),
            target,
            mapping_type: MappingType::TestLevel,
            required: true,
            active,
            specimen_type_constraint: None,
            panel_constraint: None,
            version: 1,
        }
    }

    #[test]
    fn reports_accuracy_units_and_type_warnings() {
        let fields = [
            field("glu", FieldType::Numeric, Some("mg/dL")),
            field("chol", FieldType::Numeric, Some("mg/dL")),
            field("hiv", FieldType::Qualitative, None),
        ];
        let mappings = [
            mapping("glu", MappingTarget::Test("TEST-001".to_string()), true),
            mapping("hiv", MappingTarget::Qc("LOT-1".to_string()), true),
            mapping("chol", MappingTarget::Test("TEST-002".to_string()), false),
        ];

        let report = coverage(&fields, &mappings);
        assert_eq!(report.total_fields, 3);
        assert_eq!(report.mapped_fields, 2);
        assert_eq!(report.required_mappings, 2);
        assert_eq!(report.accuracy, 66.67);
        assert_eq!(report.unmapped_fields, vec!["CHOL".to_string()]);
        assert_eq!(report.type_warnings.len(), 1);
        assert!(report.type_warnings[0].starts_with("HIV (QUALITATIVE)"));
        assert_eq!(
            report.by_unit,
            vec![
                UnitCoverage {
                    unit: "NONE".to_string(),
                    total_fields: 1,
                    mapped_fields: 1
                },
                UnitCoverage {
                    unit: "mg/dL".to_string(),
                    total_fields: 2,
                    mapped_fields: 1
                },
            ]
        );
    }

    #[test]
    fn empty_analyzer_has_zero_accuracy() {
        let report = coverage(&[], &[]);
        assert_eq!(report.accuracy, 0.0);
        assert!(report.by_unit.is_empty());
    }
}
