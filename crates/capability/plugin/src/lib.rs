//! # 仪器插件能力模块
//!
//! 插件是固定能力接口的显式实现 {探测, 布局, 写入, 应答}，启动时按仪器类型配置注册：
//!
//! ```text
//! AnalyzerTypeRecord (sort_order, plugin_name, identifier_pattern)
//!       │
//!       ▼
//! PluginRegistry::from_analyzer_types
//!       │
//!       ├── GenericASTM  H 记录第 4 字段匹配识别正则
//!       ├── GenericHL7   MSH-3 / MSH-4 匹配识别正则
//!       └── GenericFile  按仪器类型绑定
//!       │
//!       ▼
//! resolve() → Resolution::{Matched{plugin, inserter, responder}, NoMatch}
//! ```

pub mod error;
pub mod generic;
pub mod inserter;
pub mod registry;
pub mod responder;
pub mod traits;

pub use error::{InsertError, PluginError};
pub use generic::{GENERIC_ASTM, GENERIC_FILE, GENERIC_HL7, GenericPlugin};
pub use inserter::ResultStoreInserter;
pub use registry::{PluginRegistry, Resolution, ResolvedPlugin, no_match_message};
pub use responder::{AstmQueryResponder, Hl7AckResponder};
pub use traits::{AnalyzerPlugin, InsertContext, InsertOutcome, LineInserter, QueryResponder};
