//! 文件导入的内部行格式
//!
//! CSV 记录按首选字段顺序重排后以 TAB 连接；首选字段始终占位（缺失时为空），
//! 其后追加其余已映射列。

use crate::layout::{ResultField, ResultUpdate};
use crate::timestamp::parse_result_datetime;

pub const FIELD_SEPARATOR: char = '\t';

/// 首选字段顺序。
pub const PREFERRED_FIELDS: [&str; 7] = [
    "sampleId",
    "testCode",
    "result",
    "interpretation",
    "position",
    "testDate",
    "testTime",
];

const SAMPLE_ID: usize = 0;
const TEST_CODE: usize = 1;
const RESULT: usize = 2;
const TEST_DATE: usize = 5;
const TEST_TIME: usize = 6;

fn column(columns: &[&str], index: usize) -> String {
    columns
        .get(index)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// 解析内部行：第 2 列为检测代码，第 3 列为结果。
pub fn result_fields(lines: &[String]) -> Vec<ResultField> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line_index, line)| {
            let columns: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            let code = column(&columns, TEST_CODE);
            if code.is_empty() {
                return None;
            }
            let sample_id = column(&columns, SAMPLE_ID);
            let test_time = column(&columns, TEST_TIME);
            Some(ResultField {
                line_index,
                code,
                value: column(&columns, RESULT),
                units: None,
                sample_id: (!sample_id.is_empty()).then_some(sample_id),
                tested_at_ms: parse_result_datetime(&column(&columns, TEST_DATE), Some(&test_time)),
            })
        })
        .collect()
}

/// 重写检测代码与结果列（内部行不携带单位）。
pub fn rewrite_result(line: &str, update: &ResultUpdate<'_>) -> String {
    let mut columns: Vec<String> = line.split(FIELD_SEPARATOR).map(str::to_string).collect();
    while columns.len() <= RESULT {
        columns.push(String::new());
    }
    if let Some(code) = update.code {
        columns[TEST_CODE] = code.to_string();
    }
    if let Some(value) = update.value {
        columns[RESULT] = value.to_string();
    }
    columns.join(&FIELD_SEPARATOR.to_string())
}
