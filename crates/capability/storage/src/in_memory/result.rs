//! 检验结果与质控结果内存存储实现

use crate::error::StorageError;
use crate::models::{AnalyzerResultRecord, QcResultRecord};
use crate::traits::ResultStore;
use crate::validation::ensure_id;
use std::sync::RwLock;

/// 检验结果内存存储
///
/// 结果按写入顺序追加保存。
pub struct InMemoryResultStore {
    results: RwLock<Vec<AnalyzerResultRecord>>,
    qc_results: RwLock<Vec<QcResultRecord>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            results: RwLock::new(Vec::new()),
            qc_results: RwLock::new(Vec::new()),
        }
    }

    /// 当前结果条数（测试与演示使用）
    pub fn len(&self) -> usize {
        self.results.read().map(|items| items.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ResultStore for InMemoryResultStore {
    async fn insert_results(
        &self,
        records: &[AnalyzerResultRecord],
    ) -> Result<usize, StorageError> {
        for record in records {
            ensure_id(&record.result_id, "result_id")?;
        }
        let mut items = self
            .results
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        items.extend(records.iter().cloned());
        Ok(records.len())
    }

    async fn find_duplicate(
        &self,
        analyzer_id: &str,
        sample_id: &str,
        test_code: &str,
        tested_at_ms: i64,
    ) -> Result<bool, StorageError> {
        let items = self
            .results
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(items.iter().any(|item| {
            item.analyzer_id.as_deref() == Some(analyzer_id)
                && item.sample_id == sample_id
                && item.test_code == test_code
                && item.tested_at_ms == Some(tested_at_ms)
        }))
    }

    async fn list_results(
        &self,
        analyzer_id: Option<&str>,
    ) -> Result<Vec<AnalyzerResultRecord>, StorageError> {
        let items = self
            .results
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(items
            .iter()
            .filter(|item| analyzer_id.is_none() || item.analyzer_id.as_deref() == analyzer_id)
            .cloned()
            .collect())
    }

    async fn insert_qc_result(&self, record: QcResultRecord) -> Result<QcResultRecord, StorageError> {
        ensure_id(&record.qc_result_id, "qc_result_id")?;
        let mut items = self
            .qc_results
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        items.push(record.clone());
        Ok(record)
    }

    async fn list_qc_results(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<QcResultRecord>, StorageError> {
        let items = self
            .qc_results
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(items
            .iter()
            .filter(|item| item.analyzer_id == analyzer_id)
            .cloned()
            .collect())
    }
}
