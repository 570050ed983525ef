//! 映射应用引擎
//!
//! 输入为传输无关的报文行，按布局取出结果字段后逐条应用生效映射：
//!
//! 1. 样本类型/医嘱项目约束不满足时跳过该映射（字段按未映射处理，不强制必填）
//! 2. 自定义字段类型与校验规则：必填字段失败为错误，否则为告警
//! 3. 定性字段：精确匹配 → 忽略大小写匹配 → 默认项 → 记为未映射
//! 4. 单位：已是标准单位不动；命中单位映射则换算或拒收；未命中时按是否存在拒收配置决定错误或告警
//! 5. 按目标改写检测代码，同一布局重建报文行
//!
//! 没有任何生效映射时原样透传。引擎本身不写存储、不计数。

use crate::context::{FieldMapping, MappingContext};
use crate::validation::check_value;
use domain::{ErrorType, FieldType, MappingTarget, TargetKind};
use lis_protocol::{MessageLayout, OrderContext, ResultField, ResultUpdate};
use lis_storage::{QualitativeMappingRecord, UnitMappingRecord};
use std::collections::HashSet;

/// 一次成功应用的映射。
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMapping {
    pub field_name: String,
    pub target: MappingTarget,
    pub raw_value: String,
    pub mapped_value: String,
    pub raw_unit: Option<String>,
    pub mapped_unit: Option<String>,
}

/// 映射结果。`success = false` 时整条报文不得写入。
#[derive(Debug, Clone, Default)]
pub struct MappingOutcome {
    pub transformed_lines: Vec<String>,
    pub unmapped_fields: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub applied: Vec<AppliedMapping>,
    pub success: bool,
    pub has_mappings: bool,
    validation_failures: usize,
    mapping_failures: usize,
}

impl MappingOutcome {
    /// 透传：输出与输入一致。
    pub fn passthrough(lines: &[String]) -> Self {
        Self {
            transformed_lines: lines.to_vec(),
            success: true,
            ..Self::default()
        }
    }

    /// 错误记录的类型：只有规则校验失败时为 VALIDATION，否则为 MAPPING。
    pub fn error_type(&self) -> ErrorType {
        if self.validation_failures > 0 && self.mapping_failures == 0 {
            ErrorType::Validation
        } else {
            ErrorType::Mapping
        }
    }

    fn fail(&mut self, kind: ErrorType, message: String) {
        match kind {
            ErrorType::Validation => self.validation_failures += 1,
            _ => self.mapping_failures += 1,
        }
        self.errors.push(message);
    }
}

/// 单位映射结论。
#[derive(Debug, Clone, PartialEq)]
pub enum UnitResolution {
    /// 已是标准单位，或字段没有单位映射。
    Unchanged,
    /// 换算后的值（None 表示只改单位标签）与标准单位。
    Converted { value: Option<String>, unit: String },
    /// 单位不一致且配置为拒收。
    Rejected(String),
    /// 数值无法换算。
    NotConvertible(String),
    /// 没有对应映射，保持原单位。
    Unmapped(String),
}

/// 按字段的单位映射解析上报单位。
pub fn resolve_unit(units: &[UnitMappingRecord], reported: &str, value: &str) -> UnitResolution {
    let reported = reported.trim();
    if units.is_empty()
        || units
            .iter()
            .any(|item| item.canonical_unit.trim().eq_ignore_ascii_case(reported))
    {
        return UnitResolution::Unchanged;
    }

    if let Some(item) = units
        .iter()
        .find(|item| item.analyzer_unit.trim().eq_ignore_ascii_case(reported))
    {
        let canonical = item.canonical_unit.trim().to_string();
        if item.reject_if_mismatch {
            return UnitResolution::Rejected(format!(
                "unit {reported} does not match expected unit {canonical}"
            ));
        }
        let Some(factor) = item.conversion_factor else {
            return UnitResolution::Converted {
                value: None,
                unit: canonical,
            };
        };
        return match value.trim().parse::<f64>().map(|number| number * factor) {
            Ok(converted) if converted.is_finite() => UnitResolution::Converted {
                value: Some(format_number(converted)),
                unit: canonical,
            },
            _ => UnitResolution::NotConvertible(format!(
                "value '{value}' cannot be converted from {reported} to {canonical}"
            )),
        };
    }

    if units.iter().any(|item| item.reject_if_mismatch) {
        let expected: Vec<&str> = units
            .iter()
            .map(|item| item.canonical_unit.trim())
            .collect();
        return UnitResolution::Rejected(format!(
            "unit {reported} is not accepted, expected {}",
            expected.join("/")
        ));
    }
    UnitResolution::Unmapped(format!("unit {reported} has no mapping"))
}

/// 定性值翻译：精确匹配 → 忽略大小写 → 默认项。
pub fn qualitative_value(records: &[QualitativeMappingRecord], value: &str) -> Option<String> {
    let value = value.trim();
    records
        .iter()
        .find(|item| item.analyzer_value.trim() == value)
        .or_else(|| {
            records
                .iter()
                .find(|item| item.analyzer_value.trim().eq_ignore_ascii_case(value))
        })
        .or_else(|| records.iter().find(|item| item.is_default))
        .map(|item| item.canonical_code.clone())
}

/// 数值输出：保留 6 位小数并去掉末尾 0。
pub fn format_number(value: f64) -> String {
    let scaled = value * 1_000_000.0;
    // 放大后溢出的值本身已无小数位
    let rounded = if scaled.is_finite() {
        scaled.round() / 1_000_000.0
    } else {
        value
    };
    let mut text = format!("{rounded:.6}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" { "0".to_string() } else { text }
}

fn constraint_mismatch(mapping: &FieldMapping, order: &OrderContext) -> Option<String> {
    let checks = [
        (
            "specimen type",
            mapping.mapping.specimen_type_constraint.as_deref(),
            order.specimen_type.as_deref(),
        ),
        (
            "panel",
            mapping.mapping.panel_constraint.as_deref(),
            order.panel.as_deref(),
        ),
    ];
    for (name, expected, actual) in checks {
        let Some(expected) = expected.map(str::trim).filter(|value| !value.is_empty()) else {
            continue;
        };
        match actual {
            Some(actual) if actual.trim().eq_ignore_ascii_case(expected) => {}
            Some(actual) => return Some(format!("{name} {actual} does not match {expected}")),
            None => return Some(format!("{name} missing, mapping requires {expected}")),
        }
    }
    None
}

fn is_result_target(mapping: &FieldMapping) -> bool {
    mapping.mapping.target.kind() != TargetKind::Qc
}

impl MappingContext {
    /// 对报文行应用生效映射。
    pub fn apply(&self, layout: MessageLayout, lines: &[String]) -> MappingOutcome {
        let mut outcome = MappingOutcome::passthrough(lines);
        if !self.has_active_mappings() {
            return outcome;
        }
        outcome.has_mappings = true;

        let order = layout.order_context(lines);
        let mut seen_required: HashSet<&str> = HashSet::new();

        for field in layout.result_fields(lines) {
            let candidates: Vec<&FieldMapping> = self
                .mappings_for(&field.code)
                .into_iter()
                .filter(|item| is_result_target(item))
                .collect();
            if candidates.is_empty() {
                outcome.unmapped_fields.push(field.code.clone());
                continue;
            }

            let mut skipped = Vec::new();
            let selected = candidates.iter().copied().find(|item| {
                match constraint_mismatch(item, &order) {
                    Some(reason) => {
                        skipped.push(reason);
                        false
                    }
                    None => true,
                }
            });
            let Some(mapping) = selected else {
                outcome.unmapped_fields.push(field.code.clone());
                outcome.warnings.push(format!(
                    "{}: mapping skipped, {}",
                    field.code,
                    skipped.join("; ")
                ));
                continue;
            };

            if mapping.mapping.required {
                seen_required.insert(mapping.mapping.mapping_id.as_str());
            }
            if let Some(line) = self.translate(layout, lines, &field, mapping, &mut outcome) {
                outcome.transformed_lines[field.line_index] = line;
            }
        }

        for mapping in self.mappings() {
            if !mapping.mapping.required
                || !is_result_target(mapping)
                || seen_required.contains(mapping.mapping.mapping_id.as_str())
                || constraint_mismatch(mapping, &order).is_some()
            {
                continue;
            }
            outcome.fail(
                ErrorType::Mapping,
                format!(
                    "required field {} is missing from the message",
                    mapping.field.field_name
                ),
            );
        }

        outcome.success = outcome.errors.is_empty();
        outcome
    }

    /// 翻译单个字段，返回重写后的行；字段失败时返回 None。
    fn translate(
        &self,
        layout: MessageLayout,
        lines: &[String],
        field: &ResultField,
        mapping: &FieldMapping,
        outcome: &mut MappingOutcome,
    ) -> Option<String> {
        let code = field.code.as_str();
        let required = mapping.mapping.required;
        let mut failed = false;

        for failure in check_value(mapping.custom_type.as_ref(), &mapping.rules, &field.value) {
            if required {
                outcome.fail(ErrorType::Validation, format!("{code}: {failure}"));
                failed = true;
            } else {
                outcome.warnings.push(format!("{code}: {failure}"));
            }
        }

        let mut value = field.value.clone();
        if mapping.field.field_type == FieldType::Qualitative {
            match qualitative_value(&mapping.qualitative, &field.value) {
                Some(canonical) => value = canonical,
                None => {
                    outcome
                        .unmapped_fields
                        .push(format!("{code}={}", field.value));
                    let message = format!("{code}: no qualitative mapping for '{}'", field.value);
                    if required {
                        outcome.fail(ErrorType::Mapping, message);
                        failed = true;
                    } else {
                        outcome.warnings.push(message);
                    }
                }
            }
        }

        let mut unit = field.units.clone();
        if let Some(reported) = field.units.as_deref() {
            match resolve_unit(&mapping.units, reported, &value) {
                UnitResolution::Unchanged => {}
                UnitResolution::Converted {
                    value: converted,
                    unit: canonical,
                } => {
                    if let Some(converted) = converted {
                        value = converted;
                    }
                    unit = Some(canonical);
                }
                UnitResolution::Rejected(reason) => {
                    outcome.fail(ErrorType::Mapping, format!("{code}: {reason}"));
                    failed = true;
                }
                UnitResolution::NotConvertible(reason) if required => {
                    outcome.fail(ErrorType::Mapping, format!("{code}: {reason}"));
                    failed = true;
                }
                UnitResolution::NotConvertible(reason) | UnitResolution::Unmapped(reason) => {
                    outcome.warnings.push(format!("{code}: {reason}"));
                }
            }
        }

        if failed {
            return None;
        }

        let update = ResultUpdate {
            code: mapping.mapping.target.result_code(),
            value: (value != field.value).then_some(value.as_str()),
            units: (unit != field.units).then_some(unit.as_deref()).flatten(),
        };
        let line = layout.rewrite_result(lines.get(field.line_index)?, &update);
        outcome.applied.push(AppliedMapping {
            field_name: field.code.clone(),
            target: mapping.mapping.target.clone(),
            raw_value: field.value.clone(),
            mapped_value: value.clone(),
            raw_unit: field.units.clone(),
            mapped_unit: unit.clone(),
        });
        Some(line)
    }
}
