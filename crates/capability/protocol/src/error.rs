//! 协议错误类型定义

/// 报文解析错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 质控段格式错误
    #[error("invalid QC segment: {0}")]
    InvalidQcSegment(String),

    /// 时间戳解析错误
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// 串口参数不支持
    #[error("invalid serial configuration: {0}")]
    SerialConfig(String),
}
