//! 内置应答：ASTM 查询应答与 HL7 ACK

use crate::traits::QueryResponder;
use lis_protocol::{astm, hl7};

/// ASTM 查询应答：头记录 + 终止记录。
#[derive(Debug, Default)]
pub struct AstmQueryResponder;

impl QueryResponder for AstmQueryResponder {
    fn respond(&self, _lines: &[String]) -> Vec<String> {
        astm::build_query_response()
    }
}

/// HL7 ACK（MSA|AA），回显控制号。
#[derive(Debug, Default)]
pub struct Hl7AckResponder;

impl QueryResponder for Hl7AckResponder {
    fn respond(&self, lines: &[String]) -> Vec<String> {
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
        hl7::build_ack(lines, &timestamp)
    }
}
