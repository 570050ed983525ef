//! 质控 Q 段解析：`Q|seq|test^lot^level|value|unit|yyyyMMddHHmmss`

use crate::astm::{self, COMPONENT_SEPARATOR};
use crate::error::ProtocolError;
use crate::timestamp::parse_compact;
use domain::ControlLevel;

/// 解析后的质控段（值尚未做数值与单位映射）。
#[derive(Debug, Clone, PartialEq)]
pub struct QcSegment {
    pub instrument_id: Option<String>,
    pub test_code: String,
    pub control_lot: String,
    pub level: ControlLevel,
    pub value: String,
    pub unit: String,
    pub measured_at_ms: i64,
}

/// 解析单条 Q 段；`instrument_id` 取自 H 记录第 4 字段首组件。
pub fn parse_qc_segment(
    line: &str,
    instrument_id: Option<&str>,
) -> Result<QcSegment, ProtocolError> {
    if astm::record_type(line) != Some('Q') {
        return Err(ProtocolError::InvalidQcSegment(format!(
            "not a Q record: {line}"
        )));
    }
    let fields = astm::fields(line);
    if fields.len() < 6 {
        return Err(ProtocolError::InvalidQcSegment(format!(
            "expected 6 fields, got {}",
            fields.len()
        )));
    }
    let components: Vec<&str> = fields[2].split(COMPONENT_SEPARATOR).map(str::trim).collect();
    let component = |index: usize, name: &str| {
        components
            .get(index)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
            .ok_or_else(|| ProtocolError::InvalidQcSegment(format!("missing {name}")))
    };
    let test_code = component(0, "test code")?;
    let control_lot = component(1, "control lot")?;
    let level_text = component(2, "control level")?;
    let level = level_text.parse::<ControlLevel>().map_err(|_| {
        ProtocolError::InvalidQcSegment(format!("control level must be L, N or H: {level_text}"))
    })?;
    let timestamp = fields[5].trim();
    let measured_at_ms = parse_compact(timestamp)
        .ok_or_else(|| ProtocolError::InvalidTimestamp(timestamp.to_string()))?;

    Ok(QcSegment {
        instrument_id: instrument_id.map(str::to_string),
        test_code,
        control_lot,
        level,
        value: fields[3].trim().to_string(),
        unit: fields[4].trim().to_string(),
        measured_at_ms,
    })
}

/// 报文中的全部质控段（按行顺序）。
pub fn qc_lines(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .map(String::as_str)
        .filter(|line| astm::is_qc_segment(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qc_segment() {
        let segment = parse_qc_segment("Q|1|GLU^LOT-7^N|5.4|mmol/L|20240115103000", Some("ACME"))
            .expect("segment");
        assert_eq!(segment.test_code, "GLU");
        assert_eq!(segment.control_lot, "LOT-7");
        assert_eq!(segment.level, ControlLevel::Normal);
        assert_eq!(segment.instrument_id.as_deref(), Some("ACME"));
        assert_eq!(segment.unit, "mmol/L");
    }

    #[test]
    fn rejects_bad_level_and_short_segments() {
        assert!(matches!(
            parse_qc_segment("Q|1|GLU^LOT-7^X|5.4|mmol/L|20240115103000", None),
            Err(ProtocolError::InvalidQcSegment(_))
        ));
        assert!(matches!(
            parse_qc_segment("Q|1|GLU^LOT-7^N|5.4", None),
            Err(ProtocolError::InvalidQcSegment(_))
        ));
        assert!(matches!(
            parse_qc_segment("Q|1|GLU^LOT-7^N|5.4|mmol/L|soon", None),
            Err(ProtocolError::InvalidTimestamp(_))
        ));
    }
}
