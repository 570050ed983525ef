//! Transport Reader：原始字节 → 有序报文行
//!
//! 各传输方式统一输出 `Vec<String>`，下游按 `MessageLayout` 解释。

use crate::error::ReadError;
use lis_protocol::delimited::{FIELD_SEPARATOR, PREFERRED_FIELDS};
use lis_protocol::{astm, decode_bytes, hl7};
use lis_storage::{ColumnMapping, FileImportConfigRecord};
use std::collections::HashMap;

const ENQ: char = '\u{0005}';
const ACK: char = '\u{0006}';
const EOT: char = '\u{0004}';
const NAK: char = '\u{0015}';
const VT: char = '\u{000b}';
const FS: char = '\u{001c}';

fn astm_lines(payload: &[u8]) -> Vec<String> {
    let decoded = decode_bytes(payload);
    decoded
        .text
        .split(['\r', '\n'])
        .map(|line| line.trim_matches([ENQ, ACK, EOT, NAK]))
        .map(astm::strip_frame)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 读取 ASTM 报文（TCP 推送或 HTTP 提交）。
pub fn read_astm(payload: &[u8]) -> Result<Vec<String>, ReadError> {
    let lines = astm_lines(payload);
    if lines.is_empty() {
        return Err(ReadError::Empty);
    }
    Ok(lines)
}

/// 读取串口收到的 ASTM 报文。
pub fn read_serial(payload: &[u8]) -> Result<Vec<String>, ReadError> {
    let lines = astm_lines(payload);
    if lines.is_empty() {
        return Err(ReadError::EmptySerial);
    }
    Ok(lines)
}

/// 读取 HL7 报文，去除 MLLP 帧字符。
pub fn read_hl7(payload: &[u8]) -> Result<Vec<String>, ReadError> {
    let decoded = decode_bytes(payload);
    let text: String = decoded
        .text
        .chars()
        .filter(|c| *c != VT && *c != FS)
        .collect();
    let segments = hl7::split_segments(&text);
    if segments.is_empty() {
        return Err(ReadError::EmptyHl7);
    }
    Ok(segments)
}

/// 分隔文件读取参数。
#[derive(Debug, Clone)]
pub struct DelimitedOptions {
    pub delimiter: char,
    pub has_header: bool,
    /// 列名 -> 内部字段名；为空时以表头原文作字段名。
    pub column_mappings: Vec<ColumnMapping>,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            column_mappings: Vec::new(),
        }
    }
}

impl From<&FileImportConfigRecord> for DelimitedOptions {
    fn from(config: &FileImportConfigRecord) -> Self {
        Self {
            delimiter: config.delimiter,
            has_header: config.has_header,
            column_mappings: config.column_mappings.clone(),
        }
    }
}

/// 读取 CSV/分隔文件并重排为 TAB 内部行。
///
/// 有表头时：首选字段按固定顺序占位，其余已映射列按映射顺序追加。
/// 无表头时：原样以 TAB 连接各列。
pub fn read_delimited(payload: &[u8], options: &DelimitedOptions) -> Result<Vec<String>, ReadError> {
    if !options.delimiter.is_ascii() {
        return Err(ReadError::Delimited(format!(
            "delimiter must be ASCII: {:?}",
            options.delimiter
        )));
    }
    let decoded = decode_bytes(payload);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(decoded.text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ReadError::Delimited(err.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let separator = FIELD_SEPARATOR.to_string();
    let lines: Vec<String> = if options.has_header {
        let mut rows = records.into_iter();
        let Some(header) = rows.next() else {
            return Err(ReadError::EmptyFile);
        };
        let layout = ColumnLayout::new(&header, &options.column_mappings);
        rows.map(|row| layout.line(&row).join(&separator)).collect()
    } else {
        records.into_iter().map(|row| row.join(&separator)).collect()
    };

    if lines.is_empty() {
        return Err(ReadError::EmptyFile);
    }
    Ok(lines)
}

/// 表头列下标 -> 内部字段名。
struct ColumnLayout {
    by_field: HashMap<String, usize>,
    extra_fields: Vec<String>,
}

impl ColumnLayout {
    fn new(header: &[String], mappings: &[ColumnMapping]) -> Self {
        let index_of = |column: &str| {
            header
                .iter()
                .position(|name| name.trim().eq_ignore_ascii_case(column.trim()))
        };
        let pairs: Vec<(String, usize)> = if mappings.is_empty() {
            header
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.trim().is_empty())
                .map(|(index, name)| (name.trim().to_string(), index))
                .collect()
        } else {
            mappings
                .iter()
                .filter_map(|mapping| index_of(&mapping.column).map(|index| (mapping.field.clone(), index)))
                .collect()
        };

        let mut by_field = HashMap::new();
        let mut extra_fields = Vec::new();
        for (field, index) in pairs {
            if by_field.contains_key(&field) {
                continue;
            }
            if !PREFERRED_FIELDS.contains(&field.as_str()) {
                extra_fields.push(field.clone());
            }
            by_field.insert(field, index);
        }
        Self {
            by_field,
            extra_fields,
        }
    }

    fn value<'a>(&self, row: &'a [String], field: &str) -> &'a str {
        self.by_field
            .get(field)
            .and_then(|index| row.get(*index))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn line<'a>(&self, row: &'a [String]) -> Vec<&'a str> {
        PREFERRED_FIELDS
            .iter()
            .copied()
            .chain(self.extra_fields.iter().map(String::as_str))
            .map(|field| self.value(row, field))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn astm_lines_drop_framing_and_blank_lines() {
        let payload = b"\x05\x021H|\\^&|||ACME^X100\r\n\r\x022R|1|^^^GLU|5.5|mmol/L\x03A1\r\nL|1|N\r\x04";
        let lines = read_astm(payload).expect("lines");
        assert_eq!(
            lines,
            vec![
                "H|\\^&|||ACME^X100".to_string(),
                "R|1|^^^GLU|5.5|mmol/L".to_string(),
                "L|1|N".to_string(),
            ]
        );
    }

    #[test]
    fn empty_payloads_have_transport_specific_messages() {
        assert_eq!(read_astm(b"\r\n\r\n").unwrap_err().to_string(), "Empty message");
        assert_eq!(
            read_serial(b"").unwrap_err().to_string(),
            "Empty message from serial port"
        );
        assert_eq!(read_hl7(b"\x0b\x1c\r").unwrap_err().to_string(), "Empty HL7 message");
        assert_eq!(
            read_delimited(b"", &DelimitedOptions::default())
                .unwrap_err()
                .to_string(),
            "Empty file or no valid records found"
        );
    }

    #[test]
    fn hl7_strips_mllp_frame() {
        let lines = read_hl7(b"\x0bMSH|^~\\&|APP\rOBX|1|NM|GLU||5\r\x1c\r").expect("lines");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("OBX|"));
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = read_delimited(b"Sample,Test,Value\n", &DelimitedOptions::default()).unwrap_err();
        assert_eq!(err, ReadError::EmptyFile);
    }

    #[test]
    fn mapped_columns_follow_preferred_order() {
        let options = DelimitedOptions {
            delimiter: ';',
            has_header: true,
            column_mappings: vec![
                ColumnMapping {
                    column: "Value".to_string(),
                    field: "result".to_string(),
                },
                ColumnMapping {
                    column: "Sample".to_string(),
                    field: "sampleId".to_string(),
                },
                ColumnMapping {
                    column: "Assay".to_string(),
                    field: "testCode".to_string(),
                },
                ColumnMapping {
                    column: "Well".to_string(),
                    field: "well".to_string(),
                },
            ],
        };
        let payload = "Sample;Assay;Value;Well\nS-1;HIV;NEG;A1\n".as_bytes();
        let lines = read_delimited(payload, &options).expect("lines");
        assert_eq!(lines, vec!["S-1\tHIV\tNEG\t\t\t\t\tA1".to_string()]);
    }

    #[test]
    fn headerless_file_joins_columns() {
        let options = DelimitedOptions {
            has_header: false,
            ..DelimitedOptions::default()
        };
        let lines = read_delimited(b"S-1,GLU,5.5\n\nS-2,GLU,6.1\n", &options).expect("lines");
        assert_eq!(lines, vec!["S-1\tGLU\t5.5".to_string(), "S-2\tGLU\t6.1".to_string()]);
    }
}
