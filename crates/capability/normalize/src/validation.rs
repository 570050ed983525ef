//! 校验规则引擎
//!
//! - REGEX：空表达式通过，否则要求整串匹配
//! - RANGE：`{"min": 0, "max": 100}`，值必须是数字
//! - ENUM：JSON 数组，值必须在其中；空数组一律不通过
//! - LENGTH：`{"minLength": 1, "maxLength": 10}`，按字符计数
//!
//! 表达式本身不合法时返回 `MappingError::InvalidRule`。

use crate::error::MappingError;
use domain::RuleType;
use lis_storage::{CustomFieldTypeRecord, ValidationRuleRecord};
use regex::Regex;
use serde_json::Value;

/// 对单个值执行一条规则。
pub fn evaluate_rule(
    rule_type: RuleType,
    expression: &str,
    value: &str,
) -> Result<bool, MappingError> {
    match rule_type {
        RuleType::Regex => full_match(expression, value),
        RuleType::Range => {
            let bounds = parse_object(expression)?;
            let min = number_bound(&bounds, "min")?;
            let max = number_bound(&bounds, "max")?;
            if min.is_none() && max.is_none() {
                return Err(MappingError::InvalidRule(format!(
                    "range needs min or max: {expression}"
                )));
            }
            let Ok(number) = value.trim().parse::<f64>() else {
                return Ok(false);
            };
            Ok(min.is_none_or(|min| number >= min) && max.is_none_or(|max| number <= max))
        }
        RuleType::Enum => {
            let allowed: Vec<Value> = serde_json::from_str(expression)
                .map_err(|err| MappingError::InvalidRule(format!("enum must be a JSON array: {err}")))?;
            let value = value.trim();
            Ok(allowed.iter().any(|item| match item {
                Value::String(text) => text == value,
                other => other.to_string() == value,
            }))
        }
        RuleType::Length => {
            let bounds = parse_object(expression)?;
            let min = length_bound(&bounds, "minLength")?;
            let max = length_bound(&bounds, "maxLength")?;
            if min.is_none() && max.is_none() {
                return Err(MappingError::InvalidRule(format!(
                    "length needs minLength or maxLength: {expression}"
                )));
            }
            let length = value.chars().count() as u64;
            Ok(min.is_none_or(|min| length >= min) && max.is_none_or(|max| length <= max))
        }
    }
}

/// 执行字段上的自定义类型检查与全部生效规则，返回失败描述。
pub fn check_value(
    custom_type: Option<&CustomFieldTypeRecord>,
    rules: &[ValidationRuleRecord],
    value: &str,
) -> Vec<String> {
    let mut failures = Vec::new();
    if let Some(custom_type) = custom_type {
        failures.extend(check_custom_type(custom_type, value));
    }
    for rule in rules.iter().filter(|rule| rule.active) {
        match evaluate_rule(rule.rule_type, &rule.rule_expression, value) {
            Ok(true) => {}
            Ok(false) => failures.push(rule.error_message.clone().unwrap_or_else(|| {
                format!(
                    "value '{value}' failed {} rule {}",
                    rule.rule_type, rule.rule_name
                )
            })),
            Err(err) => failures.push(format!("rule {}: {err}", rule.rule_name)),
        }
    }
    failures
}

/// 自定义字段类型自带的模式、取值范围与允许字符。
pub fn check_custom_type(custom_type: &CustomFieldTypeRecord, value: &str) -> Vec<String> {
    let mut failures = Vec::new();
    let name = &custom_type.type_name;

    if let Some(pattern) = custom_type.validation_pattern.as_deref() {
        match full_match(pattern, value) {
            Ok(true) => {}
            Ok(false) => failures.push(format!("value '{value}' does not match {name} pattern")),
            Err(err) => failures.push(format!("{name}: {err}")),
        }
    }

    if custom_type.value_range_min.is_some() || custom_type.value_range_max.is_some() {
        match value.trim().parse::<f64>() {
            Ok(number) => {
                let below = custom_type.value_range_min.is_some_and(|min| number < min);
                let above = custom_type.value_range_max.is_some_and(|max| number > max);
                if below || above {
                    failures.push(format!("value '{value}' is outside the {name} range"));
                }
            }
            Err(_) => failures.push(format!("value '{value}' is not numeric for {name}")),
        }
    }

    if let Some(allowed) = custom_type
        .allowed_characters
        .as_deref()
        .filter(|allowed| !allowed.is_empty())
    {
        if let Some(bad) = value.chars().find(|c| !allowed.contains(*c)) {
            failures.push(format!("character '{bad}' is not allowed for {name}"));
        }
    }
    failures
}

fn full_match(pattern: &str, value: &str) -> Result<bool, MappingError> {
    if pattern.trim().is_empty() {
        return Ok(true);
    }
    let regex = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|err| MappingError::InvalidRule(err.to_string()))?;
    Ok(regex.is_match(value))
}

fn parse_object(expression: &str) -> Result<serde_json::Map<String, Value>, MappingError> {
    match serde_json::from_str::<Value>(expression) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MappingError::InvalidRule(format!(
            "expected a JSON object: {expression}"
        ))),
        Err(err) => Err(MappingError::InvalidRule(err.to_string())),
    }
}

fn number_bound(
    bounds: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<f64>, MappingError> {
    match bounds.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| MappingError::InvalidRule(format!("{key} must be a number"))),
    }
}

fn length_bound(
    bounds: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, MappingError> {
    match bounds.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| MappingError::InvalidRule(format!("{key} must be a non-negative integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(rule_type: RuleType, expression: &str) -> ValidationRuleRecord {
        ValidationRuleRecord {
            rule_id: "rule-1".to_string(),
            custom_field_type_id: "type-1".to_string(),
            rule_name: "check".to_string(),
            rule_type,
            rule_expression: expression.to_string(),
            error_message: None,
            active: true,
        }
    }

    #[test]
    fn regex_requires_full_match_and_empty_passes() {
        assert!(evaluate_rule(RuleType::Regex, "", "anything").expect("rule"));
        assert!(evaluate_rule(RuleType::Regex, "[0-9]+", "123").expect("rule"));
        assert!(!evaluate_rule(RuleType::Regex, "[0-9]+", "123a").expect("rule"));
        assert!(evaluate_rule(RuleType::Regex, "(", "x").is_err());
    }

    #[test]
    fn range_checks_numeric_bounds() {
        let expression = r#"{"min": 1, "max": 10}"#;
        assert!(evaluate_rule(RuleType::Range, expression, "5.5").expect("rule"));
        assert!(!evaluate_rule(RuleType::Range, expression, "11").expect("rule"));
        assert!(!evaluate_rule(RuleType::Range, expression, "high").expect("rule"));
        assert!(evaluate_rule(RuleType::Range, r#"{"max": 3}"#, "-4").expect("rule"));
        assert!(evaluate_rule(RuleType::Range, "{}", "1").is_err());
        assert!(evaluate_rule(RuleType::Range, "not json", "1").is_err());
    }

    #[test]
    fn enum_requires_membership_and_empty_fails() {
        let expression = r#"["POS", "NEG", 1]"#;
        assert!(evaluate_rule(RuleType::Enum, expression, "POS").expect("rule"));
        assert!(evaluate_rule(RuleType::Enum, expression, "1").expect("rule"));
        assert!(!evaluate_rule(RuleType::Enum, expression, "pos").expect("rule"));
        assert!(!evaluate_rule(RuleType::Enum, "[]", "POS").expect("rule"));
        assert!(evaluate_rule(RuleType::Enum, r#"{"a": 1}"#, "POS").is_err());
    }

    #[test]
    fn length_counts_characters() {
        let expression = r#"{"minLength": 2, "maxLength": 3}"#;
        assert!(evaluate_rule(RuleType::Length, expression, "ab").expect("rule"));
        assert!(!evaluate_rule(RuleType::Length, expression, "a").expect("rule"));
        assert!(!evaluate_rule(RuleType::Length, expression, "abcd").expect("rule"));
        assert!(evaluate_rule(RuleType::Length, r#"{"minLength": -1}"#, "a").is_err());
    }

    #[test]
    fn check_value_reports_custom_type_and_rule_failures() {
        let custom_type = CustomFieldTypeRecord {
            type_id: "type-1".to_string(),
            type_name: "CT_VALUE".to_string(),
            display_name: "Ct value".to_string(),
            validation_pattern: Some("[0-9.]+".to_string()),
            value_range_min: Some(0.0),
            value_range_max: Some(45.0),
            allowed_characters: Some("0123456789.".to_string()),
            active: true,
        };
        assert!(check_value(Some(&custom_type), &[], "32.5").is_empty());

        let failures = check_value(Some(&custom_type), &[], "50");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("outside"));

        let mut length = rule(RuleType::Length, r#"{"maxLength": 2}"#);
        length.error_message = Some("too long".to_string());
        let broken = rule(RuleType::Range, "oops");
        let failures = check_value(None, &[length, broken], "123");
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0], "too long");
        assert!(failures[1].starts_with("rule check"));
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut inactive = rule(RuleType::Enum, "[]");
        inactive.active = false;
        assert!(check_value(None, &[inactive], "x").is_empty());
    }
}
