//! 存储写入器：报文结果行 → AnalyzerResultRecord
//!
//! 写入前按（仪器、样本、检测代码、检测时间）做重复检查，仅告警计数，不丢弃。

use crate::error::InsertError;
use crate::traits::{InsertContext, InsertOutcome, LineInserter};
use async_trait::async_trait;
use lis_protocol::{MessageLayout, ResultField};
use lis_storage::{AnalyzerResultRecord, ResultStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// 基于 ResultStore 的写入器。
pub struct ResultStoreInserter {
    store: Arc<dyn ResultStore>,
    layout: MessageLayout,
}

impl ResultStoreInserter {
    pub fn new(store: Arc<dyn ResultStore>, layout: MessageLayout) -> Self {
        Self { store, layout }
    }

    async fn is_duplicate(
        &self,
        context: &InsertContext,
        field: &ResultField,
    ) -> Result<bool, InsertError> {
        let (Some(analyzer_id), Some(sample_id), Some(tested_at_ms)) = (
            context.analyzer_id.as_deref(),
            field.sample_id.as_deref(),
            field.tested_at_ms,
        ) else {
            return Ok(false);
        };
        let duplicate = self
            .store
            .find_duplicate(analyzer_id, sample_id, &field.code, tested_at_ms)
            .await?;
        if duplicate {
            warn!(
                target: "lis.plugin",
                analyzer_id = %analyzer_id,
                sample_id = %sample_id,
                test_code = %field.code,
                tested_at_ms,
                "duplicate_result_detected"
            );
            lis_telemetry::record_duplicate_detected();
        }
        Ok(duplicate)
    }
}

#[async_trait]
impl LineInserter for ResultStoreInserter {
    async fn insert(
        &self,
        context: &InsertContext,
        lines: &[String],
    ) -> Result<InsertOutcome, InsertError> {
        let fields = self.layout.result_fields(lines);
        let mut outcome = InsertOutcome::default();
        let mut records = Vec::with_capacity(fields.len());
        for field in fields {
            if self.is_duplicate(context, &field).await? {
                outcome.duplicates += 1;
            }
            let raw_line = lines
                .get(field.line_index)
                .cloned()
                .ok_or_else(|| InsertError::Invalid(format!("line {} missing", field.line_index)))?;
            records.push(AnalyzerResultRecord {
                result_id: uuid::Uuid::new_v4().to_string(),
                analyzer_id: context.analyzer_id.clone(),
                sample_id: field.sample_id.unwrap_or_default(),
                test_code: field.code,
                value: field.value,
                units: field.units,
                tested_at_ms: field.tested_at_ms,
                raw_line,
                inserted_by: context.user_id.clone(),
                created_at_ms: context.received_at_ms,
            });
        }
        if records.is_empty() {
            debug!(target: "lis.plugin", layout = self.layout.as_str(), "no_result_lines");
            return Ok(outcome);
        }
        outcome.inserted = self.store.insert_results(&records).await?;
        lis_telemetry::record_results_inserted(outcome.inserted as u64);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lis_storage::InMemoryResultStore;

    fn context() -> InsertContext {
        InsertContext {
            analyzer_id: Some("analyzer-1".to_string()),
            user_id: "SYSTEM".to_string(),
            received_at_ms: 1_000,
        }
    }

    fn message() -> Vec<String> {
        [
            "H|\\^&|||ACME^X100",
            "O|1|S-001||^^^GLU",
            "R|1|^^^GLU|5.5|mmol/L||N||F||||20240115103000",
            "L|1|N",
        ]
        .iter()
        .map(|line| line.to_string())
        .collect()
    }

    #[tokio::test]
    async fn duplicates_are_counted_and_still_inserted() {
        let store = Arc::new(InMemoryResultStore::new());
        let inserter = ResultStoreInserter::new(store.clone(), MessageLayout::Astm);

        let first = inserter.insert(&context(), &message()).await.expect("insert");
        assert_eq!(first, InsertOutcome { inserted: 1, duplicates: 0 });

        let second = inserter.insert(&context(), &message()).await.expect("insert");
        assert_eq!(second, InsertOutcome { inserted: 1, duplicates: 1 });
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn message_without_results_inserts_nothing() {
        let store = Arc::new(InMemoryResultStore::new());
        let inserter = ResultStoreInserter::new(store.clone(), MessageLayout::Astm);
        let lines = vec!["H|\\^&|||ACME".to_string(), "L|1|N".to_string()];
        let outcome = inserter.insert(&context(), &lines).await.expect("insert");
        assert_eq!(outcome, InsertOutcome::default());
        assert!(store.is_empty());
    }
}
