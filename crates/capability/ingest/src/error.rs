//! 接入错误类型定义

use domain::ErrorType;

/// 长驻采集源错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("handler error: {0}")]
    Handler(String),
    #[error("source error: {0}")]
    Source(String),
    #[error("serial error: {0}")]
    Serial(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 报文读取失败。Display 文本直接呈现给操作员。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("Empty message")]
    Empty,
    #[error("Empty message from serial port")]
    EmptySerial,
    #[error("Empty HL7 message")]
    EmptyHl7,
    #[error("Empty file or no valid records found")]
    EmptyFile,
    #[error("read timed out after {0} ms")]
    Timeout(u64),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("invalid delimited file: {0}")]
    Delimited(String),
}

impl ReadError {
    /// 对应的仪器错误类型。
    pub fn error_type(&self) -> ErrorType {
        match self {
            ReadError::Timeout(_) => ErrorType::Timeout,
            ReadError::Connection(_) => ErrorType::Connection,
            _ => ErrorType::Protocol,
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Connection(err.to_string())
    }
}
