//! 映射引擎错误类型

use lis_storage::StorageError;

/// 映射错误。
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("mapping provider error: {0}")]
    Provider(String),
    #[error("invalid mapping configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid rule expression: {0}")]
    InvalidRule(String),
    #[error("error recorder failed: {0}")]
    Recorder(String),
    #[error("message is {size} bytes, preview limit is {max} bytes")]
    PreviewTooLarge { size: usize, max: usize },
}

impl From<StorageError> for MappingError {
    fn from(err: StorageError) -> Self {
        Self::Provider(err.to_string())
    }
}
