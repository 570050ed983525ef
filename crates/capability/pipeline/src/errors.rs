//! 仪器错误服务：记录、查询、确认、解决
//!
//! 错误记录只追加不删除；状态只能 UNACKNOWLEDGED → ACKNOWLEDGED → RESOLVED 单向推进。

use crate::lifecycle::AnalyzerLifecycle;
use async_trait::async_trait;
use domain::{ErrorStatus, LifecycleEvent};
use lis_ingest::now_epoch_ms;
use lis_normalize::{ErrorRecorder, MappingError, NewAnalyzerError};
use lis_storage::{
    AnalyzerErrorRecord, AnalyzerErrorStore, AnalyzerErrorUpdate, ErrorFilter, ErrorStatistics,
    StorageError,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ErrorServiceError {
    #[error("analyzer error not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for ErrorServiceError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// 批量确认结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchAcknowledge {
    pub acknowledged: Vec<String>,
    pub not_found: Vec<String>,
}

#[derive(Clone)]
pub struct ErrorService {
    store: Arc<dyn AnalyzerErrorStore>,
    lifecycle: Option<AnalyzerLifecycle>,
}

impl ErrorService {
    pub fn new(store: Arc<dyn AnalyzerErrorStore>) -> Self {
        Self {
            store,
            lifecycle: None,
        }
    }

    /// 错误创建、全部确认时驱动仪器状态。
    pub fn with_lifecycle(mut self, lifecycle: AnalyzerLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub async fn create(
        &self,
        error: NewAnalyzerError,
    ) -> Result<AnalyzerErrorRecord, ErrorServiceError> {
        let now_ms = now_epoch_ms();
        let record = AnalyzerErrorRecord {
            error_id: uuid::Uuid::new_v4().to_string(),
            analyzer_id: error.analyzer_id,
            error_type: error.error_type,
            severity: error.severity,
            error_message: error.message,
            raw_message: error.raw_message,
            status: ErrorStatus::Unacknowledged,
            acknowledged_by: None,
            acknowledged_at_ms: None,
            resolved_at_ms: None,
            created_at_ms: now_ms,
        };
        let saved = self.store.insert_error(record).await?;
        lis_telemetry::record_analyzer_error();
        info!(
            target: "lis.errors",
            error_id = %saved.error_id,
            analyzer_id = saved.analyzer_id.as_deref().unwrap_or("-"),
            error_type = %saved.error_type,
            severity = %saved.severity,
            message = %saved.error_message,
            "analyzer_error_recorded"
        );
        if let Some(analyzer_id) = saved.analyzer_id.as_deref() {
            self.fire(analyzer_id, LifecycleEvent::ErrorCreated, now_ms)
                .await;
        }
        Ok(saved)
    }

    pub async fn get(&self, error_id: &str) -> Result<AnalyzerErrorRecord, ErrorServiceError> {
        self.store
            .find_error(error_id)
            .await?
            .ok_or_else(|| ErrorServiceError::NotFound(error_id.to_string()))
    }

    pub async fn list(
        &self,
        filter: &ErrorFilter,
    ) -> Result<Vec<AnalyzerErrorRecord>, ErrorServiceError> {
        Ok(self.store.list_errors(filter).await?)
    }

    pub async fn statistics(&self, now_ms: i64) -> Result<ErrorStatistics, ErrorServiceError> {
        Ok(self.store.error_statistics(now_ms).await?)
    }

    /// 确认错误。已确认或已解决的记录原样返回。
    pub async fn acknowledge(
        &self,
        error_id: &str,
        user_id: &str,
    ) -> Result<AnalyzerErrorRecord, ErrorServiceError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ErrorServiceError::Invalid("userId is required".to_string()));
        }
        let current = self.get(error_id).await?;
        if current.status != ErrorStatus::Unacknowledged {
            return Ok(current);
        }
        let now_ms = now_epoch_ms();
        let update = AnalyzerErrorUpdate {
            status: Some(ErrorStatus::Acknowledged),
            acknowledged_by: Some(user_id.to_string()),
            acknowledged_at_ms: Some(now_ms),
            resolved_at_ms: None,
        };
        let updated = self
            .store
            .update_error(error_id, update)
            .await?
            .ok_or_else(|| ErrorServiceError::NotFound(error_id.to_string()))?;
        info!(
            target: "lis.errors",
            error_id = %error_id,
            user_id = %user_id,
            "analyzer_error_acknowledged"
        );
        if let Some(analyzer_id) = updated.analyzer_id.as_deref() {
            self.fire(analyzer_id, LifecycleEvent::ErrorsAcknowledged, now_ms)
                .await;
        }
        Ok(updated)
    }

    pub async fn batch_acknowledge(
        &self,
        error_ids: &[String],
        user_id: &str,
    ) -> Result<BatchAcknowledge, ErrorServiceError> {
        if user_id.trim().is_empty() {
            return Err(ErrorServiceError::Invalid("userId is required".to_string()));
        }
        let mut result = BatchAcknowledge::default();
        for error_id in error_ids {
            match self.acknowledge(error_id, user_id).await {
                Ok(_) => result.acknowledged.push(error_id.clone()),
                Err(ErrorServiceError::NotFound(_)) => result.not_found.push(error_id.clone()),
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }

    /// 标记为已解决。确认信息保持不变。
    pub async fn resolve(&self, error_id: &str) -> Result<AnalyzerErrorRecord, ErrorServiceError> {
        let current = self.get(error_id).await?;
        if current.status == ErrorStatus::Resolved {
            return Ok(current);
        }
        let update = AnalyzerErrorUpdate {
            status: Some(ErrorStatus::Resolved),
            resolved_at_ms: Some(now_epoch_ms()),
            ..AnalyzerErrorUpdate::default()
        };
        let updated = self
            .store
            .update_error(error_id, update)
            .await?
            .ok_or_else(|| ErrorServiceError::NotFound(error_id.to_string()))?;
        info!(target: "lis.errors", error_id = %error_id, "analyzer_error_resolved");
        Ok(updated)
    }

    async fn fire(&self, analyzer_id: &str, event: LifecycleEvent, now_ms: i64) {
        let Some(lifecycle) = self.lifecycle.as_ref() else {
            return;
        };
        if let Err(err) = lifecycle.on_event(analyzer_id, event, now_ms).await {
            warn!(
                target: "lis.errors",
                analyzer_id = %analyzer_id,
                event = %event,
                error = %err,
                "lifecycle_event_failed"
            );
        }
    }
}

#[async_trait]
impl ErrorRecorder for ErrorService {
    async fn record(&self, error: NewAnalyzerError) -> Result<String, MappingError> {
        self.create(error)
            .await
            .map(|record| record.error_id)
            .map_err(|err| MappingError::Recorder(err.to_string()))
    }
}
