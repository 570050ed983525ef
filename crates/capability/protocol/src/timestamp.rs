//! 报文时间戳解析（统一输出毫秒 epoch，按 UTC 处理）

use chrono::{NaiveDate, NaiveDateTime};

/// 结果文件中常见的日期时间格式，按顺序尝试。
pub const RESULT_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

/// 解析 ASTM/HL7 紧凑时间戳：yyyyMMddHHmmss，也接受 yyyyMMddHHmm 与 yyyyMMdd。
pub fn parse_compact(value: &str) -> Option<i64> {
    let value = value.trim();
    // HL7 允许带时区/小数秒后缀，只取前 14 位数字
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    let parsed = match digits.len() {
        len if len >= 14 => NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S").ok(),
        12 => NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M").ok(),
        8 => NaiveDate::parse_from_str(&digits, "%Y%m%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0)),
        _ => None,
    }?;
    Some(parsed.and_utc().timestamp_millis())
}

/// 解析分开的日期与时间列。
pub fn parse_result_datetime(date: &str, time: Option<&str>) -> Option<i64> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    let combined = match time.map(str::trim).filter(|time| !time.is_empty()) {
        Some(time) => format!("{date} {time}"),
        None => date.to_string(),
    };
    RESULT_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&combined, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .filter(|_| time.map_or(true, |t| t.trim().is_empty()))
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|parsed| parsed.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_timestamp() {
        assert_eq!(parse_compact("19700101000001"), Some(1_000));
        assert_eq!(parse_compact("19700102"), Some(86_400_000));
        assert_eq!(parse_compact("20240115103000+0100"), parse_compact("20240115103000"));
        assert_eq!(parse_compact("2024"), None);
    }

    #[test]
    fn result_datetime_formats() {
        let iso = parse_result_datetime("2024-01-15", Some("10:30:00")).expect("iso");
        assert_eq!(parse_result_datetime("01/15/2024", Some("10:30:00")), Some(iso));
        assert_eq!(parse_result_datetime("15-01-2024", Some("10:30:00")), Some(iso));
        assert_eq!(
            parse_result_datetime("2024-01-15", Some("10:30")),
            Some(iso)
        );
        assert_eq!(parse_result_datetime("yesterday", None), None);
    }
}
