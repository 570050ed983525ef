//! 写入策略选择：有生效映射时走映射感知写入器，否则直接使用插件写入器

use crate::context::MappingContext;
use crate::engine::MappingOutcome;
use crate::inserter::MappingAwareInserter;
use crate::recorder::ErrorRecorder;
use lis_plugin::{InsertContext, InsertError, InsertOutcome, LineInserter};
use lis_protocol::MessageLayout;
use std::sync::Arc;

/// 写入策略。
pub enum InserterStrategy {
    Plain(Arc<dyn LineInserter>),
    MappingAware(MappingAwareInserter),
}

/// 策略执行结果；直接写入时没有映射报告。
#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub insert: InsertOutcome,
    pub mapping: Option<MappingOutcome>,
    pub warning_error_id: Option<String>,
}

impl InserterStrategy {
    /// 在调用写入之前决定策略。未识别的仪器或没有生效映射时为 Plain。
    pub fn select(
        plugin_inserter: Arc<dyn LineInserter>,
        context: Option<Arc<MappingContext>>,
        layout: MessageLayout,
        recorder: Arc<dyn ErrorRecorder>,
        raw_message: &str,
    ) -> Self {
        match context {
            Some(context) if context.has_active_mappings() => Self::MappingAware(
                MappingAwareInserter::new(context, layout, plugin_inserter, recorder, raw_message),
            ),
            _ => Self::Plain(plugin_inserter),
        }
    }

    pub fn is_mapping_aware(&self) -> bool {
        matches!(self, Self::MappingAware(_))
    }

    pub async fn insert(
        &self,
        context: &InsertContext,
        lines: &[String],
    ) -> Result<StrategyOutcome, InsertError> {
        match self {
            Self::Plain(inserter) => Ok(StrategyOutcome {
                insert: inserter.insert(context, lines).await?,
                ..StrategyOutcome::default()
            }),
            Self::MappingAware(inserter) => {
                let report = inserter.insert_mapped(context, lines).await?;
                Ok(StrategyOutcome {
                    insert: report.insert,
                    mapping: Some(report.mapping),
                    warning_error_id: report.warning_error_id,
                })
            }
        }
    }
}
