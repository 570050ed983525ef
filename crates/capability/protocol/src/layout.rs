//! 报文布局：映射引擎与插入器通过布局读取/重写结果字段，与传输方式无关。

use crate::{astm, delimited, hl7};

/// 报文中的一条结果。
#[derive(Debug, Clone, PartialEq)]
pub struct ResultField {
    /// 所在行下标。
    pub line_index: usize,
    /// 仪器检测代码（映射的字段名）。
    pub code: String,
    pub value: String,
    pub units: Option<String>,
    pub sample_id: Option<String>,
    pub tested_at_ms: Option<i64>,
}

/// 结果行的重写内容，None 表示保持原值。
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultUpdate<'a> {
    pub code: Option<&'a str>,
    pub value: Option<&'a str>,
    pub units: Option<&'a str>,
}

impl ResultUpdate<'_> {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.value.is_none() && self.units.is_none()
    }
}

/// 医嘱上下文（用于样本类型/组合约束）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderContext {
    pub specimen_type: Option<String>,
    pub panel: Option<String>,
}

/// 报文布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLayout {
    Astm,
    Hl7,
    Delimited,
}

impl MessageLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Astm => "ASTM",
            Self::Hl7 => "HL7",
            Self::Delimited => "DELIMITED",
        }
    }

    /// 按内容识别布局：MSH 开头为 HL7，含 H 记录为 ASTM，其余按分隔文件处理。
    pub fn detect(text: &str) -> Self {
        let body = text.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{000b}');
        if body.starts_with("MSH|") {
            return Self::Hl7;
        }
        let has_header = body
            .split(['\r', '\n'])
            .any(|line| astm::record_type(line) == Some('H'));
        if has_header { Self::Astm } else { Self::Delimited }
    }

    pub fn result_fields(&self, lines: &[String]) -> Vec<ResultField> {
        match self {
            Self::Astm => astm::result_fields(lines),
            Self::Hl7 => hl7::result_fields(lines),
            Self::Delimited => delimited::result_fields(lines),
        }
    }

    pub fn rewrite_result(&self, line: &str, update: &ResultUpdate<'_>) -> String {
        if update.is_empty() {
            return line.to_string();
        }
        match self {
            Self::Astm => astm::rewrite_result(line, update),
            Self::Hl7 => hl7::rewrite_result(line, update),
            Self::Delimited => delimited::rewrite_result(line, update),
        }
    }

    pub fn order_context(&self, lines: &[String]) -> OrderContext {
        match self {
            Self::Astm => astm::order_context(lines),
            Self::Hl7 => hl7::order_context(lines),
            Self::Delimited => OrderContext::default(),
        }
    }

    /// 报文头中的仪器名（ASTM H 第 4 字段显示名，HL7 MSH-3）。
    pub fn header_name(&self, lines: &[String]) -> Option<String> {
        match self {
            Self::Astm => astm::header_display_name(lines),
            Self::Hl7 => hl7::sending_application(lines),
            Self::Delimited => None,
        }
    }

    pub fn is_result_message(&self, lines: &[String]) -> bool {
        match self {
            Self::Astm => astm::is_result_message(lines),
            Self::Hl7 => hl7::is_result_message(lines),
            Self::Delimited => !lines.is_empty(),
        }
    }
}
