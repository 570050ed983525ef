//! 映射配置写入前检查

use crate::error::MappingError;
use lis_storage::{QualitativeMappingRecord, UnitMappingRecord};
use std::collections::HashSet;

/// 单位映射：两端单位必填；单位不同且不拒收时必须给出有限正数的换算系数。
pub fn check_unit_mapping(record: &UnitMappingRecord) -> Result<(), MappingError> {
    let analyzer_unit = record.analyzer_unit.trim();
    let canonical_unit = record.canonical_unit.trim();
    if analyzer_unit.is_empty() || canonical_unit.is_empty() {
        return Err(MappingError::InvalidConfig(
            "unit mapping requires analyzer and canonical units".to_string(),
        ));
    }
    if let Some(factor) = record.conversion_factor {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MappingError::InvalidConfig(format!(
                "conversion factor must be positive: {factor}"
            )));
        }
    }
    let differs = !analyzer_unit.eq_ignore_ascii_case(canonical_unit);
    if differs && record.conversion_factor.is_none() && !record.reject_if_mismatch {
        return Err(MappingError::InvalidConfig(format!(
            "conversion factor required for {analyzer_unit} -> {canonical_unit}"
        )));
    }
    Ok(())
}

/// 定性映射：同一字段下仪器值不重复（忽略大小写），默认项至多一个。
pub fn check_qualitative_mappings(
    records: &[QualitativeMappingRecord],
) -> Result<(), MappingError> {
    let mut seen = HashSet::new();
    let mut defaults: HashSet<&str> = HashSet::new();
    for record in records {
        let value = record.analyzer_value.trim();
        if value.is_empty() || record.canonical_code.trim().is_empty() {
            return Err(MappingError::InvalidConfig(
                "qualitative mapping requires analyzer value and canonical code".to_string(),
            ));
        }
        let key = (record.analyzer_field_id.as_str(), value.to_ascii_uppercase());
        if !seen.insert(key) {
            return Err(MappingError::InvalidConfig(format!(
                "duplicate qualitative value '{value}' for field {}",
                record.analyzer_field_id
            )));
        }
        if record.is_default && !defaults.insert(record.analyzer_field_id.as_str()) {
            return Err(MappingError::InvalidConfig(format!(
                "more than one default qualitative mapping for field {}",
                record.analyzer_field_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(analyzer_unit: &str, canonical_unit: &str) -> UnitMappingRecord {
        UnitMappingRecord {
            mapping_id: "unit-1".to_string(),
            analyzer_field_id: "field-1".to_string(),
            analyzer_unit: analyzer_unit.to_string(),
            canonical_unit: canonical_unit.to_string(),
            conversion_factor: None,
            reject_if_mismatch: false,
        }
    }

    fn qualitative(value: &str, is_default: bool) -> QualitativeMappingRecord {
        QualitativeMappingRecord {
            mapping_id: format!("q-{value}"),
            analyzer_field_id: "field-1".to_string(),
            analyzer_value: value.to_string(),
            canonical_code: "CODE".to_string(),
            is_default,
        }
    }

    #[test]
    fn differing_units_need_a_factor_unless_rejected() {
        assert!(check_unit_mapping(&unit("mg/dL", "MG/DL")).is_ok());
        assert!(check_unit_mapping(&unit("mg/dL", "mmol/L")).is_err());

        let mut converted = unit("mg/dL", "mmol/L");
        converted.conversion_factor = Some(0.0555);
        assert!(check_unit_mapping(&converted).is_ok());

        let mut rejected = unit("mg/dL", "mmol/L");
        rejected.reject_if_mismatch = true;
        assert!(check_unit_mapping(&rejected).is_ok());

        let mut negative = unit("mg/dL", "mmol/L");
        negative.conversion_factor = Some(-1.0);
        assert!(check_unit_mapping(&negative).is_err());
        assert!(check_unit_mapping(&unit("", "mmol/L")).is_err());
    }

    #[test]
    fn qualitative_values_are_unique_with_single_default() {
        assert!(check_qualitative_mappings(&[qualitative("POS", false), qualitative("NEG", true)]).is_ok());
        assert!(check_qualitative_mappings(&[qualitative("POS", false), qualitative("pos", false)]).is_err());
        assert!(check_qualitative_mappings(&[qualitative("POS", true), qualitative("NEG", true)]).is_err());
    }
}
