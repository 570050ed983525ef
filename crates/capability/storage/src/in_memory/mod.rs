//! 内存存储实现模块
//!
//! 用于本地演示（种子数据）和测试。
//!
//! 包含以下实现：
//! - AnalyzerStore: InMemoryAnalyzerStore
//! - MappingStore: InMemoryMappingStore
//! - AnalyzerErrorStore: InMemoryAnalyzerErrorStore
//! - ResultStore: InMemoryResultStore
//! - TransportConfigStore: InMemoryTransportConfigStore

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
