//! ASTM LIS2-A2 记录解析
//!
//! 一行一条记录，字段以 `|` 分隔，组件以 `^` 分隔。
//! 只处理定位头记录、医嘱记录与结果记录所需的字段。

use crate::layout::{OrderContext, ResultField, ResultUpdate};
use crate::timestamp::parse_compact;

pub const FIELD_SEPARATOR: char = '|';
pub const COMPONENT_SEPARATOR: char = '^';

const STX: char = '\u{0002}';
const ETX: char = '\u{0003}';
const ETB: char = '\u{0017}';

/// 去除帧控制字符与帧序号（`\x02` + 数字前缀、`\x03`/`\x17` 之后的校验和）。
pub fn strip_frame(line: &str) -> &str {
    let mut line = line.trim_start_matches(STX);
    if let Some(end) = line.find([ETX, ETB]) {
        line = &line[..end];
    }
    let line = line.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();
    if bytes.len() > 2
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_alphabetic()
        && bytes[2] == b'|'
    {
        return &line[1..];
    }
    line
}

/// 记录类型（H/P/O/R/Q/C/L），大写。
pub fn record_type(line: &str) -> Option<char> {
    let line = strip_frame(line);
    let mut chars = line.chars();
    let kind = chars.next()?;
    if chars.next() == Some(FIELD_SEPARATOR) && kind.is_ascii_alphabetic() {
        Some(kind.to_ascii_uppercase())
    } else {
        None
    }
}

pub fn fields(line: &str) -> Vec<&str> {
    strip_frame(line).split(FIELD_SEPARATOR).collect()
}

fn field<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or("")
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// 第一条 H 记录。
pub fn header_line(lines: &[String]) -> Option<&str> {
    lines
        .iter()
        .map(String::as_str)
        .find(|line| record_type(line) == Some('H'))
}

/// H 记录第 4 字段原文（如 `ACME^X100^1.0`）。
pub fn header_sender(lines: &[String]) -> Option<String> {
    let header = header_line(lines)?;
    non_empty(field(&fields(header), 4))
}

/// 仪器显示名：两个及以上组件时取 `制造商 型号`，否则取第一个组件。
pub fn header_display_name(lines: &[String]) -> Option<String> {
    let sender = header_sender(lines)?;
    let parts: Vec<&str> = sender.split(COMPONENT_SEPARATOR).map(str::trim).collect();
    match parts.as_slice() {
        [first, second, ..] if !second.is_empty() => non_empty(&format!("{first} {second}")),
        [first, ..] => non_empty(first),
        [] => None,
    }
}

/// 仪器标识：H 记录第 4 字段的第一个组件。
pub fn instrument_id(lines: &[String]) -> Option<String> {
    let sender = header_sender(lines)?;
    sender.split(COMPONENT_SEPARATOR).next().and_then(non_empty)
}

/// 从 R 记录第 2 字段取检测代码：优先第 4 个组件（`^^^CODE`），否则取第一个非空组件。
pub fn result_code(universal_test_id: &str) -> Option<String> {
    let components: Vec<&str> = universal_test_id.split(COMPONENT_SEPARATOR).collect();
    components
        .get(3)
        .and_then(|code| non_empty(code))
        .or_else(|| components.iter().find_map(|component| non_empty(component)))
}

fn rewrite_code(universal_test_id: &str, code: &str) -> String {
    let mut components: Vec<String> = universal_test_id
        .split(COMPONENT_SEPARATOR)
        .map(str::to_string)
        .collect();
    if components.len() >= 4 && !components[3].trim().is_empty() {
        components[3] = code.to_string();
    } else if let Some(slot) = components.iter_mut().find(|c| !c.trim().is_empty()) {
        *slot = code.to_string();
    } else {
        return format!("^^^{code}");
    }
    components.join(&COMPONENT_SEPARATOR.to_string())
}

/// 是否为结果报文：含 R 记录或质控 Q 段。
pub fn is_result_message(lines: &[String]) -> bool {
    lines.iter().any(|line| match record_type(line) {
        Some('R') => true,
        Some('Q') => is_qc_segment(line),
        _ => false,
    })
}

/// 质控 Q 段：`Q|seq|test^lot^level|value|...`，第 2 字段三个组件均非空且有结果值。
/// 普通查询记录（`Q|1|^SAMPLE||ALL`）不满足此条件。
pub fn is_qc_segment(line: &str) -> bool {
    if record_type(line) != Some('Q') {
        return false;
    }
    let fields = fields(line);
    let components: Vec<&str> = field(&fields, 2).split(COMPONENT_SEPARATOR).collect();
    components.len() >= 3
        && components[..3].iter().all(|c| !c.trim().is_empty())
        && !field(&fields, 3).trim().is_empty()
}

/// 提取结果字段；样本号取自最近一条 O 记录第 2 字段。
pub fn result_fields(lines: &[String]) -> Vec<ResultField> {
    let mut sample_id: Option<String> = None;
    let mut results = Vec::new();
    for (line_index, line) in lines.iter().enumerate() {
        match record_type(line) {
            Some('O') => {
                let fields = fields(line);
                sample_id = non_empty(field(&fields, 2).split(COMPONENT_SEPARATOR).next().unwrap_or(""));
            }
            Some('R') => {
                let fields = fields(line);
                let Some(code) = result_code(field(&fields, 2)) else {
                    continue;
                };
                results.push(ResultField {
                    line_index,
                    code,
                    value: field(&fields, 3).trim().to_string(),
                    units: non_empty(field(&fields, 4)),
                    sample_id: sample_id.clone(),
                    tested_at_ms: parse_compact(field(&fields, 12)),
                });
            }
            _ => {}
        }
    }
    results
}

/// 重写 R 记录的代码、结果值或单位，其余字段保持原样。
pub fn rewrite_result(line: &str, update: &ResultUpdate<'_>) -> String {
    let mut fields: Vec<String> = fields(line).into_iter().map(str::to_string).collect();
    while fields.len() < 5 {
        fields.push(String::new());
    }
    if let Some(code) = update.code {
        fields[2] = rewrite_code(&fields[2], code);
    }
    if let Some(value) = update.value {
        fields[3] = value.to_string();
    }
    if let Some(units) = update.units {
        fields[4] = units.to_string();
    }
    fields.join(&FIELD_SEPARATOR.to_string())
}

/// 第一条 O 记录的样本类型（第 15 字段）与医嘱项目（第 4 字段）。
pub fn order_context(lines: &[String]) -> OrderContext {
    let Some(order) = lines.iter().find(|line| record_type(line) == Some('O')) else {
        return OrderContext::default();
    };
    let fields = fields(order);
    OrderContext {
        specimen_type: field(&fields, 15)
            .split(COMPONENT_SEPARATOR)
            .next()
            .and_then(non_empty),
        panel: result_code(field(&fields, 4)),
    }
}

/// 查询应答：头记录 + 终止记录。
pub fn build_query_response() -> Vec<String> {
    vec!["H|\\^&|||LIS^1.0".to_string(), "L|1|N".to_string()]
}
