//! 插件错误类型定义

use lis_storage::StorageError;

/// 插件探测/构建错误。
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("invalid identifier pattern: {0}")]
    InvalidPattern(String),
}

/// 结果写入错误。
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid result: {0}")]
    Invalid(String),
    /// 映射失败，整条报文拒绝写入（错误记录已生成）。
    #[error("{message}")]
    Rejected {
        message: String,
        error_id: Option<String>,
    },
}

impl From<StorageError> for InsertError {
    fn from(err: StorageError) -> Self {
        InsertError::Storage(err.message().to_string())
    }
}
