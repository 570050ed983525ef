//! 插件能力接口：探测、布局、写入、应答

use crate::error::{InsertError, PluginError};
use async_trait::async_trait;
use lis_protocol::MessageLayout;
use std::sync::Arc;

/// 写入上下文。
#[derive(Debug, Clone)]
pub struct InsertContext {
    pub analyzer_id: Option<String>,
    pub user_id: String,
    pub received_at_ms: i64,
}

/// 写入结果。重复记录仍会写入，只做计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// 报文行写入器。
#[async_trait]
pub trait LineInserter: Send + Sync {
    async fn insert(
        &self,
        context: &InsertContext,
        lines: &[String],
    ) -> Result<InsertOutcome, InsertError>;
}

/// 查询类报文的应答构造器。
pub trait QueryResponder: Send + Sync {
    fn respond(&self, lines: &[String]) -> Vec<String>;
}

/// 仪器插件。
pub trait AnalyzerPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn layout(&self) -> MessageLayout;

    /// 能否处理这条报文。返回 Err 或 panic 均视为不匹配。
    fn is_target_analyzer(&self, lines: &[String]) -> Result<bool, PluginError>;

    /// 结果报文走写入，否则走应答。
    fn is_analyzer_result(&self, lines: &[String]) -> bool {
        self.layout().is_result_message(lines)
    }

    fn line_inserter(&self) -> Arc<dyn LineInserter>;

    fn responder(&self) -> Option<Arc<dyn QueryResponder>> {
        None
    }

    /// 绑定的仪器类型。
    fn type_id(&self) -> Option<&str> {
        None
    }
}
