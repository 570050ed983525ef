//! # PostgreSQL 存储实现模块
//!
//! 所有存储接口的 PostgreSQL 实现，表结构见 `migrations/0001_lis_schema.sql`。
//!
//! ## 包含的实现
//!
//! - **AnalyzerStore** (`analyzer.rs`)：`analyzers`、`analyzer_types`
//! - **MappingStore** (`mapping.rs`)：`analyzer_fields`、`analyzer_field_mappings`、
//!   `qualitative_result_mappings`、`unit_mappings`、`custom_field_types`、`validation_rules`
//! - **AnalyzerErrorStore** (`analyzer_error.rs`)：`analyzer_errors`
//! - **ResultStore** (`result.rs`)：`analyzer_results`、`qc_results`
//! - **TransportConfigStore** (`transport_config.rs`)：`file_import_configs`、`serial_port_configs`
//!
//! ## 约定
//!
//! - 所有 SQL 使用参数绑定（`$1`, `$2` 等）
//! - 枚举以大写字符串存储，读取时经 `FromStr` 解析
//! - 时间戳统一为毫秒 epoch（bigint）
//! - 返回 `Option<T>` 表示"可能不存在"

pub mod analyzer;
pub mod analyzer_error;
pub mod mapping;
pub mod result;
pub mod transport_config;

pub use analyzer::*;
pub use analyzer_error::*;
pub use mapping::*;
pub use result::*;
pub use transport_config::*;

use crate::error::StorageError;
use std::str::FromStr;

/// 解析数据库中的枚举字符串。
pub(crate) fn parse_column<T>(value: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| StorageError::new(err.to_string()))
}
