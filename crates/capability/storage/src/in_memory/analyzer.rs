//! 仪器内存存储实现

use crate::error::StorageError;
use crate::models::{AnalyzerRecord, AnalyzerTypeRecord};
use crate::traits::AnalyzerStore;
use crate::validation::ensure_id;
use domain::AnalyzerStatus;
use std::collections::HashMap;
use std::sync::RwLock;

/// 仪器内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryAnalyzerStore {
    analyzers: RwLock<HashMap<String, AnalyzerRecord>>,
    types: RwLock<HashMap<String, AnalyzerTypeRecord>>,
}

impl InMemoryAnalyzerStore {
    pub fn new() -> Self {
        Self {
            analyzers: RwLock::new(HashMap::new()),
            types: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAnalyzerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AnalyzerStore for InMemoryAnalyzerStore {
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerRecord>, StorageError> {
        let map = self
            .analyzers
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<AnalyzerRecord> = map.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn find_analyzer(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let item = self
            .analyzers
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(analyzer_id)
            .cloned();
        Ok(item)
    }

    async fn find_analyzer_by_name(
        &self,
        name: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let map = self
            .analyzers
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map
            .values()
            .find(|item| item.name.trim().eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn find_analyzer_by_ip(
        &self,
        ip_address: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let ip_address = ip_address.trim();
        if ip_address.is_empty() {
            return Ok(None);
        }
        let map = self
            .analyzers
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map
            .values()
            .find(|item| item.ip_address.as_deref().map(str::trim) == Some(ip_address))
            .cloned())
    }

    async fn upsert_analyzer(&self, record: AnalyzerRecord) -> Result<AnalyzerRecord, StorageError> {
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        let mut map = self
            .analyzers
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.analyzer_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_analyzer_status(
        &self,
        analyzer_id: &str,
        status: AnalyzerStatus,
        last_activated_ms: Option<i64>,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let mut map = self
            .analyzers
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(analyzer) = map.get_mut(analyzer_id) else {
            return Ok(None);
        };
        analyzer.status = status;
        if let Some(last_activated_ms) = last_activated_ms {
            analyzer.last_activated_ms = Some(last_activated_ms);
        }
        Ok(Some(analyzer.clone()))
    }

    async fn list_analyzer_types(&self) -> Result<Vec<AnalyzerTypeRecord>, StorageError> {
        let map = self
            .types
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<AnalyzerTypeRecord> = map.values().cloned().collect();
        items.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    async fn find_analyzer_type(
        &self,
        type_id: &str,
    ) -> Result<Option<AnalyzerTypeRecord>, StorageError> {
        let item = self
            .types
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(type_id)
            .cloned();
        Ok(item)
    }

    async fn upsert_analyzer_type(
        &self,
        record: AnalyzerTypeRecord,
    ) -> Result<AnalyzerTypeRecord, StorageError> {
        ensure_id(&record.type_id, "type_id")?;
        let mut map = self
            .types
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.type_id.clone(), record.clone());
        Ok(record)
    }
}
