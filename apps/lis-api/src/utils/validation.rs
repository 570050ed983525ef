//! 输入验证辅助函数
//!
//! - normalize_required：必填字段去空格并检查非空
//! - parse_optional：可选的枚举参数（如 `severity=ERROR`）
//!
//! 失败返回 bad_request_error 响应。

use crate::utils::response::bad_request_error;
use axum::response::Response;
use std::str::FromStr;

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: &str, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

/// 解析可选的大写枚举参数，空字符串视为未提供
pub fn parse_optional<T>(value: Option<&str>, field: &str) -> Result<Option<T>, Response>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| bad_request_error(format!("{field}: {err}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use domain::Severity;

    #[test]
    fn optional_enum_accepts_lowercase_and_blank() {
        let parsed: Option<Severity> = parse_optional(Some("critical"), "severity").expect("parse");
        assert_eq!(parsed, Some(Severity::Critical));
        let blank: Option<Severity> = parse_optional(Some("  "), "severity").expect("parse");
        assert!(blank.is_none());
    }

    #[test]
    fn invalid_enum_is_bad_request() {
        let response = parse_optional::<Severity>(Some("LOUD"), "severity").expect_err("invalid");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = normalize_required(" ", "userId").expect_err("blank");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
