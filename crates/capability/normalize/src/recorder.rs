//! 仪器错误记录接口（由流水线的错误服务实现）

use crate::error::MappingError;
use async_trait::async_trait;
use domain::{ErrorType, Severity};

/// 待记录的仪器错误。
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalyzerError {
    pub analyzer_id: Option<String>,
    pub error_type: ErrorType,
    pub severity: Severity,
    pub message: String,
    /// 原始报文，重处理时据此重新读取。
    pub raw_message: String,
}

impl NewAnalyzerError {
    pub fn new(
        analyzer_id: Option<&str>,
        error_type: ErrorType,
        severity: Severity,
        message: impl Into<String>,
        raw_message: impl Into<String>,
    ) -> Self {
        Self {
            analyzer_id: analyzer_id.map(str::to_string),
            error_type,
            severity,
            message: message.into(),
            raw_message: raw_message.into(),
        }
    }
}

/// 错误记录器，返回新错误的 ID。
#[async_trait]
pub trait ErrorRecorder: Send + Sync {
    async fn record(&self, error: NewAnalyzerError) -> Result<String, MappingError>;
}
