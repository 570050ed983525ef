//! 验证辅助函数
//!
//! 写入前的最小一致性检查：
//! - ensure_id：主键/外键非空
//! - ensure_factor：换算系数为有限正数

use crate::error::StorageError;

/// 验证 ID 非空
pub fn ensure_id(value: &str, field: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::new(format!("{field} required")));
    }
    Ok(())
}

/// 验证换算系数
pub fn ensure_factor(factor: Option<f64>) -> Result<(), StorageError> {
    match factor {
        Some(value) if !value.is_finite() || value <= 0.0 => {
            Err(StorageError::new("conversion_factor must be positive"))
        }
        _ => Ok(()),
    }
}
