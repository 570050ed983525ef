//! # LIS Normalize 模块
//!
//! 映射应用引擎：把仪器专有的代码、定性值、单位改写为实验室系统的标准表示。
//!
//! ```text
//! 报文行 ──► MappingContext::apply() ──► MappingOutcome
//!              │  生效映射（MappingProvider 加载）
//!              │  校验规则（validation）
//!              │  定性值 / 单位换算（engine）
//!              ▼
//! InserterStrategy::select()
//!   ├── Plain          插件写入器原样写入
//!   └── MappingAware   映射失败记 ERROR、未映射记 WARNING，成功后委托插件写入器
//! ```
//!
//! 另外提供质控 Q 段处理、映射预览与覆盖率统计、映射配置检查。

pub mod config_check;
pub mod context;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod inserter;
pub mod preview;
pub mod qc;
pub mod recorder;
pub mod strategy;
pub mod validation;

pub use config_check::{check_qualitative_mappings, check_unit_mapping};
pub use context::{FieldMapping, MappingContext, MappingProvider, StorageMappingProvider};
pub use coverage::{CoverageReport, UnitCoverage, coverage};
pub use engine::{AppliedMapping, MappingOutcome, UnitResolution, resolve_unit};
pub use error::MappingError;
pub use inserter::{MappedInsert, MappingAwareInserter};
pub use preview::{MappingPreview, ensure_preview_size, preview};
pub use qc::{QcProcessor, QcReport};
pub use recorder::{ErrorRecorder, NewAnalyzerError};
pub use strategy::{InserterStrategy, StrategyOutcome};
pub use validation::{check_value, evaluate_rule};
