//! HL7 v2.x 段解析（ORU^R01 结果与 ACK 应答）

use crate::layout::{OrderContext, ResultField, ResultUpdate};
use crate::timestamp::parse_compact;

pub const SEGMENT_TERMINATOR: char = '\r';

/// 规范化段分隔符（`\r\n`、`\n` → `\r`），拆分并去除空段。
pub fn split_segments(text: &str) -> Vec<String> {
    text.replace("\r\n", "\r")
        .replace('\n', "\r")
        .split(SEGMENT_TERMINATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn segment_name(line: &str) -> &str {
    line.split('|').next().unwrap_or("")
}

fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or("")
}

fn component(value: &str, index: usize) -> Option<String> {
    value
        .split('^')
        .nth(index)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn find_segment<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    lines
        .iter()
        .map(String::as_str)
        .find(|line| segment_name(line) == name)
}

/// 取 MSH-n。MSH-1 是字段分隔符本身，因此 MSH-n 位于拆分后的第 n-1 项。
pub fn msh_field(lines: &[String], position: usize) -> Option<String> {
    if position < 2 {
        return None;
    }
    let msh = find_segment(lines, "MSH")?;
    let fields: Vec<&str> = msh.split('|').collect();
    let value = field(&fields, position - 1).trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// MSH-3 发送应用。
pub fn sending_application(lines: &[String]) -> Option<String> {
    msh_field(lines, 3)
}

/// MSH-4 发送机构。
pub fn sending_facility(lines: &[String]) -> Option<String> {
    msh_field(lines, 4)
}

/// 是否为结果报文：含 OBX 段或消息类型为 ORU。
pub fn is_result_message(lines: &[String]) -> bool {
    if find_segment(lines, "OBX").is_some() {
        return true;
    }
    msh_field(lines, 9).is_some_and(|kind| kind.to_ascii_uppercase().starts_with("ORU"))
}

/// OBX-3 第 1 组件为代码，为空时回退到第 4 组件（备用标识）。
fn observation_code(identifier: &str) -> Option<String> {
    component(identifier, 0).or_else(|| component(identifier, 3))
}

fn sample_id(lines: &[String]) -> Option<String> {
    if let Some(obr) = find_segment(lines, "OBR") {
        let fields: Vec<&str> = obr.split('|').collect();
        if let Some(id) = component(field(&fields, 3), 0).or_else(|| component(field(&fields, 2), 0)) {
            return Some(id);
        }
    }
    let pid = find_segment(lines, "PID")?;
    let fields: Vec<&str> = pid.split('|').collect();
    component(field(&fields, 3), 0)
}

/// 提取 OBX 结果：代码、OBX-5 值、OBX-6 单位、OBX-14 时间。
pub fn result_fields(lines: &[String]) -> Vec<ResultField> {
    let sample_id = sample_id(lines);
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| segment_name(line) == "OBX")
        .filter_map(|(line_index, line)| {
            let fields: Vec<&str> = line.split('|').collect();
            let code = observation_code(field(&fields, 3))?;
            Some(ResultField {
                line_index,
                code,
                value: field(&fields, 5).trim().to_string(),
                units: component(field(&fields, 6), 0),
                sample_id: sample_id.clone(),
                tested_at_ms: parse_compact(field(&fields, 14)),
            })
        })
        .collect()
}

/// 重写 OBX 段的代码、值或单位。
pub fn rewrite_result(line: &str, update: &ResultUpdate<'_>) -> String {
    let mut fields: Vec<String> = line.split('|').map(str::to_string).collect();
    while fields.len() < 7 {
        fields.push(String::new());
    }
    if let Some(code) = update.code {
        let mut components: Vec<String> = fields[3].split('^').map(str::to_string).collect();
        let slot = if components[0].trim().is_empty() && components.len() > 3 {
            3
        } else {
            0
        };
        components[slot] = code.to_string();
        fields[3] = components.join("^");
    }
    if let Some(value) = update.value {
        fields[5] = value.to_string();
    }
    if let Some(units) = update.units {
        let mut components: Vec<String> = fields[6].split('^').map(str::to_string).collect();
        components[0] = units.to_string();
        fields[6] = components.join("^");
    }
    fields.join("|")
}

/// OBR-15 或 SPM-4 样本类型，OBR-4 医嘱项目。
pub fn order_context(lines: &[String]) -> OrderContext {
    let mut context = OrderContext::default();
    if let Some(obr) = find_segment(lines, "OBR") {
        let fields: Vec<&str> = obr.split('|').collect();
        context.specimen_type = component(field(&fields, 15), 0);
        context.panel = component(field(&fields, 4), 0);
    }
    if context.specimen_type.is_none() {
        if let Some(spm) = find_segment(lines, "SPM") {
            let fields: Vec<&str> = spm.split('|').collect();
            context.specimen_type = component(field(&fields, 4), 0);
        }
    }
    context
}

/// 构造 ACK（MSA|AA）。`timestamp` 为 yyyyMMddHHmmss。
pub fn build_ack(lines: &[String], timestamp: &str) -> Vec<String> {
    let receiver_app = sending_application(lines).unwrap_or_default();
    let receiver_facility = sending_facility(lines).unwrap_or_default();
    let control_id = msh_field(lines, 10).unwrap_or_default();
    let version = msh_field(lines, 12).unwrap_or_else(|| "2.5.1".to_string());
    let trigger = msh_field(lines, 9)
        .and_then(|kind| component(&kind, 1))
        .map(|event| format!("ACK^{event}"))
        .unwrap_or_else(|| "ACK".to_string());
    vec![
        format!(
            "MSH|^~\\&|LIS|LAB|{receiver_app}|{receiver_facility}|{timestamp}||{trigger}|{control_id}|P|{version}"
        ),
        format!("MSA|AA|{control_id}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORU: &str = "MSH|^~\\&|ACME-LAB|WARD1|LIS|LAB|20240115103000||ORU^R01|MSG001|P|2.5.1\r\n\
PID|1||P-100\n\
OBR|1|ORD-9|S-001|CBC^Blood count\r\
OBX|1|NM|GLU^Glucose||5.5|mmol/L^^UCUM|||||F|||20240115102000\r\
OBX|2|ST|^^^HIV||NEG\r";

    #[test]
    fn segments_are_normalised() {
        let lines = split_segments(ORU);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("MSH|"));
        assert!(split_segments("\r\n\n").is_empty());
    }

    #[test]
    fn msh_positions() {
        let lines = split_segments(ORU);
        assert_eq!(sending_application(&lines).as_deref(), Some("ACME-LAB"));
        assert_eq!(sending_facility(&lines).as_deref(), Some("WARD1"));
        assert!(is_result_message(&lines));
    }

    #[test]
    fn obx_fields_and_fallback_code() {
        let lines = split_segments(ORU);
        let results = result_fields(&lines);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].code, "GLU");
        assert_eq!(results[0].units.as_deref(), Some("mmol/L"));
        assert_eq!(results[0].sample_id.as_deref(), Some("S-001"));
        assert!(results[0].tested_at_ms.is_some());
        assert_eq!(results[1].code, "HIV");
        assert_eq!(results[1].value, "NEG");
    }

    #[test]
    fn rewrite_obx() {
        let rewritten = rewrite_result(
            "OBX|1|NM|GLU^Glucose||100|mg/dL",
            &ResultUpdate {
                code: Some("TEST-001"),
                value: Some("5.55"),
                units: Some("mmol/L"),
            },
        );
        assert_eq!(rewritten, "OBX|1|NM|TEST-001^Glucose||5.55|mmol/L");
    }

    #[test]
    fn ack_echoes_control_id() {
        let lines = split_segments(ORU);
        let ack = build_ack(&lines, "20240115103001");
        assert_eq!(
            ack[0],
            "MSH|^~\\&|LIS|LAB|ACME-LAB|WARD1|20240115103001||ACK^R01|MSG001|P|2.5.1"
        );
        assert_eq!(ack[1], "MSA|AA|MSG001");
    }
}
