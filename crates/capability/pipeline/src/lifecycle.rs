//! 仪器状态生命周期
//!
//! ```text
//! SETUP ──映射创建──► VALIDATION ──映射全部激活──► ACTIVE ◄──错误全部确认── ERROR_PENDING
//!                                                  │  ▲                        ▲   │
//!                                                  │  └──────连接测试成功──┐    │   │
//!                                                  │         新建未确认错误 ─┼────┘   │
//!                                                  └──连接测试失败──► OFFLINE ◄──────┘
//! ```
//!
//! 事件只在仪器处于预期源状态时生效；显式迁移不在表内则返回 IllegalTransition。

use domain::{AnalyzerStatus, LifecycleEvent};
use lis_storage::{AnalyzerErrorStore, AnalyzerRecord, AnalyzerStore, MappingStore, StorageError};
use std::sync::Arc;
use tracing::{info, warn};

/// 一天的毫秒数。
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("analyzer not found: {0}")]
    NotFound(String),
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        from: AnalyzerStatus,
        to: AnalyzerStatus,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// 状态迁移结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub analyzer_id: String,
    pub previous: AnalyzerStatus,
    pub status: AnalyzerStatus,
    pub changed: bool,
}

impl StatusChange {
    fn unchanged(analyzer: &AnalyzerRecord) -> Self {
        Self {
            analyzer_id: analyzer.analyzer_id.clone(),
            previous: analyzer.status,
            status: analyzer.status,
            changed: false,
        }
    }
}

#[derive(Clone)]
pub struct AnalyzerLifecycle {
    analyzers: Arc<dyn AnalyzerStore>,
    mappings: Arc<dyn MappingStore>,
    errors: Arc<dyn AnalyzerErrorStore>,
}

impl AnalyzerLifecycle {
    pub fn new(
        analyzers: Arc<dyn AnalyzerStore>,
        mappings: Arc<dyn MappingStore>,
        errors: Arc<dyn AnalyzerErrorStore>,
    ) -> Self {
        Self {
            analyzers,
            mappings,
            errors,
        }
    }

    async fn load(&self, analyzer_id: &str) -> Result<AnalyzerRecord, LifecycleError> {
        self.analyzers
            .find_analyzer(analyzer_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(analyzer_id.to_string()))
    }

    /// 显式迁移到目标状态；目标与当前相同时不做任何事。
    pub async fn transition(
        &self,
        analyzer_id: &str,
        target: AnalyzerStatus,
        now_ms: i64,
    ) -> Result<StatusChange, LifecycleError> {
        let analyzer = self.load(analyzer_id).await?;
        if analyzer.status == target {
            return Ok(StatusChange::unchanged(&analyzer));
        }
        if !analyzer.status.can_transition_to(target) {
            warn!(
                target: "lis.lifecycle",
                analyzer_id = %analyzer_id,
                from = %analyzer.status,
                to = %target,
                "illegal_transition"
            );
            return Err(LifecycleError::IllegalTransition {
                from: analyzer.status,
                to: target,
            });
        }
        self.apply(&analyzer, target, now_ms).await
    }

    /// 处理业务事件；源状态不符或前置条件不满足时返回 `changed = false`。
    pub async fn on_event(
        &self,
        analyzer_id: &str,
        event: LifecycleEvent,
        now_ms: i64,
    ) -> Result<StatusChange, LifecycleError> {
        let analyzer = self.load(analyzer_id).await?;
        let (sources, target) = event.transition();
        if !sources.contains(&analyzer.status) || !self.precondition(analyzer_id, event).await? {
            return Ok(StatusChange::unchanged(&analyzer));
        }
        self.apply(&analyzer, target, now_ms).await
    }

    async fn precondition(
        &self,
        analyzer_id: &str,
        event: LifecycleEvent,
    ) -> Result<bool, LifecycleError> {
        match event {
            LifecycleEvent::MappingsActivated => {
                let mappings = self.mappings.list_mappings(analyzer_id).await?;
                Ok(!mappings.is_empty() && mappings.iter().all(|mapping| mapping.active))
            }
            LifecycleEvent::ErrorsAcknowledged => {
                Ok(self.errors.count_unacknowledged(analyzer_id).await? == 0)
            }
            _ => Ok(true),
        }
    }

    async fn apply(
        &self,
        analyzer: &AnalyzerRecord,
        target: AnalyzerStatus,
        now_ms: i64,
    ) -> Result<StatusChange, LifecycleError> {
        let activated = target == AnalyzerStatus::Active
            && matches!(
                analyzer.status,
                AnalyzerStatus::Validation | AnalyzerStatus::Offline
            );
        self.analyzers
            .update_analyzer_status(&analyzer.analyzer_id, target, activated.then_some(now_ms))
            .await?
            .ok_or_else(|| LifecycleError::NotFound(analyzer.analyzer_id.clone()))?;
        lis_telemetry::record_status_transition();
        info!(
            target: "lis.lifecycle",
            analyzer_id = %analyzer.analyzer_id,
            from = %analyzer.status,
            to = %target,
            "analyzer_status_changed"
        );
        Ok(StatusChange {
            analyzer_id: analyzer.analyzer_id.clone(),
            previous: analyzer.status,
            status: target,
            changed: true,
        })
    }

    /// 激活时间早于 `offline_after_ms` 的 ACTIVE 仪器转为 OFFLINE。
    pub async fn sweep(
        &self,
        now_ms: i64,
        offline_after_ms: i64,
    ) -> Result<Vec<StatusChange>, LifecycleError> {
        let mut changes = Vec::new();
        for analyzer in self.analyzers.list_analyzers().await? {
            let stale = analyzer.status == AnalyzerStatus::Active
                && analyzer
                    .last_activated_ms
                    .is_some_and(|activated| now_ms.saturating_sub(activated) > offline_after_ms);
            if stale {
                changes.push(self.apply(&analyzer, AnalyzerStatus::Offline, now_ms).await?);
            }
        }
        if !changes.is_empty() {
            info!(target: "lis.lifecycle", count = changes.len(), "lifecycle_sweep_completed");
        }
        Ok(changes)
    }
}
