//! 检验仪器接入领域模型：状态机枚举、映射目标、入站报文。

#[macro_use]
mod macros;

pub mod analyzer;
pub mod data;
pub mod error;
pub mod mapping;
pub mod serial;

pub use analyzer::{AnalyzerStatus, ControlLevel, LifecycleEvent, ProtocolVersion};
pub use data::{InboundMessage, Transport};
pub use error::{ErrorStatus, ErrorType, Severity};
pub use mapping::{FieldType, MappingTarget, MappingType, RuleType, TargetKind};
pub use serial::{FlowControl, Parity, StopBits};

/// 枚举字符串解析失败。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}
