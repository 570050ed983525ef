//! 仪器错误内存存储实现

use crate::error::StorageError;
use crate::models::{AnalyzerErrorRecord, AnalyzerErrorUpdate, ErrorFilter, ErrorStatistics};
use crate::traits::AnalyzerErrorStore;
use crate::validation::ensure_id;
use domain::{ErrorStatus, Severity};
use std::collections::HashMap;
use std::sync::RwLock;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// 仪器错误内存存储
pub struct InMemoryAnalyzerErrorStore {
    errors: RwLock<HashMap<String, AnalyzerErrorRecord>>,
}

impl InMemoryAnalyzerErrorStore {
    pub fn new() -> Self {
        Self {
            errors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAnalyzerErrorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AnalyzerErrorStore for InMemoryAnalyzerErrorStore {
    async fn insert_error(
        &self,
        record: AnalyzerErrorRecord,
    ) -> Result<AnalyzerErrorRecord, StorageError> {
        ensure_id(&record.error_id, "error_id")?;
        let mut map = self
            .errors
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.error_id) {
            return Err(StorageError::new("analyzer error already exists"));
        }
        map.insert(record.error_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_error(
        &self,
        error_id: &str,
    ) -> Result<Option<AnalyzerErrorRecord>, StorageError> {
        let item = self
            .errors
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(error_id)
            .cloned();
        Ok(item)
    }

    async fn update_error(
        &self,
        error_id: &str,
        update: AnalyzerErrorUpdate,
    ) -> Result<Option<AnalyzerErrorRecord>, StorageError> {
        let mut map = self
            .errors
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(record) = map.get_mut(error_id) else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(acknowledged_by) = update.acknowledged_by {
            record.acknowledged_by = Some(acknowledged_by);
        }
        if let Some(acknowledged_at_ms) = update.acknowledged_at_ms {
            record.acknowledged_at_ms = Some(acknowledged_at_ms);
        }
        if let Some(resolved_at_ms) = update.resolved_at_ms {
            record.resolved_at_ms = Some(resolved_at_ms);
        }
        Ok(Some(record.clone()))
    }

    async fn list_errors(
        &self,
        filter: &ErrorFilter,
    ) -> Result<Vec<AnalyzerErrorRecord>, StorageError> {
        let map = self
            .errors
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<AnalyzerErrorRecord> = map
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| a.error_id.cmp(&b.error_id))
        });
        if let Some(limit) = filter.limit {
            items.truncate(limit.max(0) as usize);
        }
        Ok(items)
    }

    async fn count_unacknowledged(&self, analyzer_id: &str) -> Result<i64, StorageError> {
        let map = self
            .errors
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map
            .values()
            .filter(|record| {
                record.analyzer_id.as_deref() == Some(analyzer_id)
                    && record.status == ErrorStatus::Unacknowledged
            })
            .count() as i64)
    }

    async fn error_statistics(&self, now_ms: i64) -> Result<ErrorStatistics, StorageError> {
        let map = self
            .errors
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut stats = ErrorStatistics::default();
        for record in map.values() {
            stats.total_errors += 1;
            if record.status == ErrorStatus::Unacknowledged {
                stats.unacknowledged += 1;
            }
            if record.severity == Severity::Critical {
                stats.critical += 1;
            }
            if record.created_at_ms >= now_ms - DAY_MS {
                stats.last_24_hours += 1;
            }
        }
        Ok(stats)
    }
}
