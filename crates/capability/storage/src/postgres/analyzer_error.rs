//! Postgres 仪器错误存储实现

use super::parse_column;
use crate::error::StorageError;
use crate::models::{AnalyzerErrorRecord, AnalyzerErrorUpdate, ErrorFilter, ErrorStatistics};
use crate::traits::AnalyzerErrorStore;
use crate::validation::ensure_id;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const ERROR_COLUMNS: &str = "error_id, analyzer_id, error_type, severity, error_message, raw_message, \
     status, acknowledged_by, acknowledged_at_ms, resolved_at_ms, created_at_ms";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct PgAnalyzerErrorStore {
    pub pool: PgPool,
}

impl PgAnalyzerErrorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn error_from_row(row: &PgRow) -> Result<AnalyzerErrorRecord, StorageError> {
    let error_type: String = row.try_get("error_type")?;
    let severity: String = row.try_get("severity")?;
    let status: String = row.try_get("status")?;
    Ok(AnalyzerErrorRecord {
        error_id: row.try_get("error_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        error_type: parse_column(&error_type)?,
        severity: parse_column(&severity)?,
        error_message: row.try_get("error_message")?,
        raw_message: row.try_get("raw_message")?,
        status: parse_column(&status)?,
        acknowledged_by: row.try_get("acknowledged_by")?,
        acknowledged_at_ms: row.try_get("acknowledged_at_ms")?,
        resolved_at_ms: row.try_get("resolved_at_ms")?,
        created_at_ms: row.try_get("created_at_ms")?,
    })
}

#[async_trait::async_trait]
impl AnalyzerErrorStore for PgAnalyzerErrorStore {
    async fn insert_error(
        &self,
        record: AnalyzerErrorRecord,
    ) -> Result<AnalyzerErrorRecord, StorageError> {
        ensure_id(&record.error_id, "error_id")?;
        sqlx::query(&format!(
            "insert into analyzer_errors ({ERROR_COLUMNS}) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(&record.error_id)
        .bind(&record.analyzer_id)
        .bind(record.error_type.as_str())
        .bind(record.severity.as_str())
        .bind(&record.error_message)
        .bind(&record.raw_message)
        .bind(record.status.as_str())
        .bind(&record.acknowledged_by)
        .bind(record.acknowledged_at_ms)
        .bind(record.resolved_at_ms)
        .bind(record.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_error(
        &self,
        error_id: &str,
    ) -> Result<Option<AnalyzerErrorRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {ERROR_COLUMNS} from analyzer_errors where error_id = $1"
        ))
        .bind(error_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(error_from_row).transpose()
    }

    async fn update_error(
        &self,
        error_id: &str,
        update: AnalyzerErrorUpdate,
    ) -> Result<Option<AnalyzerErrorRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "update analyzer_errors set \
             status = coalesce($1, status), \
             acknowledged_by = coalesce($2, acknowledged_by), \
             acknowledged_at_ms = coalesce($3, acknowledged_at_ms), \
             resolved_at_ms = coalesce($4, resolved_at_ms) \
             where error_id = $5 returning {ERROR_COLUMNS}"
        ))
        .bind(update.status.map(|status| status.as_str()))
        .bind(update.acknowledged_by)
        .bind(update.acknowledged_at_ms)
        .bind(update.resolved_at_ms)
        .bind(error_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(error_from_row).transpose()
    }

    async fn list_errors(
        &self,
        filter: &ErrorFilter,
    ) -> Result<Vec<AnalyzerErrorRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {ERROR_COLUMNS} from analyzer_errors where \
             ($1::text is null or analyzer_id = $1) and \
             ($2::text is null or error_type = $2) and \
             ($3::text is null or severity = $3) and \
             ($4::text is null or status = $4) and \
             ($5::bigint is null or created_at_ms >= $5) and \
             ($6::bigint is null or created_at_ms <= $6) \
             order by created_at_ms desc, error_id limit $7"
        ))
        .bind(&filter.analyzer_id)
        .bind(filter.error_type.map(|value| value.as_str()))
        .bind(filter.severity.map(|value| value.as_str()))
        .bind(filter.status.map(|value| value.as_str()))
        .bind(filter.created_from_ms)
        .bind(filter.created_to_ms)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(error_from_row).collect()
    }

    async fn count_unacknowledged(&self, analyzer_id: &str) -> Result<i64, StorageError> {
        let row = sqlx::query(
            "select count(*) as total from analyzer_errors \
             where analyzer_id = $1 and status = 'UNACKNOWLEDGED'",
        )
        .bind(analyzer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    async fn error_statistics(&self, now_ms: i64) -> Result<ErrorStatistics, StorageError> {
        let row = sqlx::query(
            "select count(*) as total_errors, \
             count(*) filter (where status = 'UNACKNOWLEDGED') as unacknowledged, \
             count(*) filter (where severity = 'CRITICAL') as critical, \
             count(*) filter (where created_at_ms >= $1) as last_24_hours \
             from analyzer_errors",
        )
        .bind(now_ms - DAY_MS)
        .fetch_one(&self.pool)
        .await?;
        Ok(ErrorStatistics {
            total_errors: row.try_get("total_errors")?,
            unacknowledged: row.try_get("unacknowledged")?,
            critical: row.try_get("critical")?,
            last_24_hours: row.try_get("last_24_hours")?,
        })
    }
}
