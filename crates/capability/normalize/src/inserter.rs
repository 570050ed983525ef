//! 映射感知写入器：先应用映射，再委托插件自己的写入器
//!
//! - 映射失败（必填缺失、单位拒收、必填校验失败）：记录 ERROR 级错误，整条报文不写入
//! - 存在未映射字段：记录 WARNING 级错误，映射后的报文照常写入

use crate::context::MappingContext;
use crate::engine::MappingOutcome;
use crate::recorder::{ErrorRecorder, NewAnalyzerError};
use async_trait::async_trait;
use domain::{ErrorType, Severity};
use lis_plugin::{InsertContext, InsertError, InsertOutcome, LineInserter};
use lis_protocol::MessageLayout;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 映射写入报告。
#[derive(Debug, Clone)]
pub struct MappedInsert {
    pub insert: InsertOutcome,
    pub mapping: MappingOutcome,
    /// 未映射字段生成的 WARNING 错误 ID。
    pub warning_error_id: Option<String>,
}

/// 包装插件写入器的映射层。
pub struct MappingAwareInserter {
    context: Arc<MappingContext>,
    layout: MessageLayout,
    inner: Arc<dyn LineInserter>,
    recorder: Arc<dyn ErrorRecorder>,
    raw_message: String,
}

impl MappingAwareInserter {
    pub fn new(
        context: Arc<MappingContext>,
        layout: MessageLayout,
        inner: Arc<dyn LineInserter>,
        recorder: Arc<dyn ErrorRecorder>,
        raw_message: impl Into<String>,
    ) -> Self {
        Self {
            context,
            layout,
            inner,
            recorder,
            raw_message: raw_message.into(),
        }
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    pub async fn insert_mapped(
        &self,
        context: &InsertContext,
        lines: &[String],
    ) -> Result<MappedInsert, InsertError> {
        let analyzer_id = self.context.analyzer_id();
        let mapping = self.context.apply(self.layout, lines);
        for _ in &mapping.applied {
            lis_telemetry::record_mapping_applied();
        }
        if !mapping.unmapped_fields.is_empty() {
            lis_telemetry::record_unmapped_fields(mapping.unmapped_fields.len() as u64);
        }

        if !mapping.success {
            let message = format!("Mapping failed: {}", mapping.errors.join("; "));
            warn!(
                target: "lis.mapping",
                analyzer_id = %analyzer_id,
                errors = mapping.errors.len(),
                "mapping_rejected"
            );
            return match self
                .record(mapping.error_type(), Severity::Error, &message)
                .await
            {
                Ok(error_id) => Err(InsertError::Rejected {
                    message,
                    error_id: Some(error_id),
                }),
                Err(err) => Err(InsertError::Storage(format!(
                    "{message}; error record failed: {err}"
                ))),
            };
        }

        let warning_error_id = if mapping.unmapped_fields.is_empty() {
            None
        } else {
            let message = format!("Unmapped fields: {}", mapping.unmapped_fields.join(", "));
            match self
                .record(ErrorType::Mapping, Severity::Warning, &message)
                .await
            {
                Ok(error_id) => Some(error_id),
                Err(err) => {
                    error!(target: "lis.mapping", analyzer_id = %analyzer_id, error = %err, "unmapped_warning_record_failed");
                    None
                }
            }
        };

        let insert = self.inner.insert(context, &mapping.transformed_lines).await?;
        info!(
            target: "lis.mapping",
            analyzer_id = %analyzer_id,
            applied = mapping.applied.len(),
            unmapped = mapping.unmapped_fields.len(),
            warnings = mapping.warnings.len(),
            inserted = insert.inserted,
            "mapping_applied"
        );
        Ok(MappedInsert {
            insert,
            mapping,
            warning_error_id,
        })
    }

    async fn record(
        &self,
        error_type: ErrorType,
        severity: Severity,
        message: &str,
    ) -> Result<String, crate::MappingError> {
        self.recorder
            .record(NewAnalyzerError::new(
                Some(self.context.analyzer_id()),
                error_type,
                severity,
                message,
                self.raw_message.clone(),
            ))
            .await
    }
}

#[async_trait]
impl LineInserter for MappingAwareInserter {
    async fn insert(
        &self,
        context: &InsertContext,
        lines: &[String],
    ) -> Result<InsertOutcome, InsertError> {
        self.insert_mapped(context, lines)
            .await
            .map(|report| report.insert)
    }
}
