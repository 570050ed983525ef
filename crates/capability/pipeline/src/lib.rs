//! # LIS Pipeline 模块
//!
//! 把各能力模块串成完整的报文处理流水线：
//!
//! - **MessageProcessor**（`processor`）：读取 → 插件解析 → 仪器识别 → 映射写入 → 质控
//! - **AnalyzerIdentifier**（`identify`）：报文头仪器名、来源 IP、插件类型
//! - **ErrorService**（`errors`）：错误记录、确认、解决
//! - **AnalyzerLifecycle**（`lifecycle`）：仪器状态迁移与离线巡检
//!
//! `MessageProcessor` 实现 `lis_ingest::MessageHandler`，长驻采集源直接把报文交给它。

pub mod errors;
pub mod identify;
pub mod lifecycle;
pub mod processor;

pub use errors::{BatchAcknowledge, ErrorService, ErrorServiceError};
pub use identify::AnalyzerIdentifier;
pub use lifecycle::{AnalyzerLifecycle, DAY_MS, LifecycleError, StatusChange};
pub use processor::{
    DEFAULT_PREVIEW_MAX_BYTES, MessageProcessor, PipelineStores, ProcessError, ProcessOutcome,
    ProcessStatus, ReprocessOutcome, SYSTEM_USER,
};
