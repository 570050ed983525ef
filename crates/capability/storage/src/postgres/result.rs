//! Postgres 检验结果存储实现

use super::parse_column;
use crate::error::StorageError;
use crate::models::{AnalyzerResultRecord, QcResultRecord};
use crate::traits::ResultStore;
use crate::validation::ensure_id;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const RESULT_COLUMNS: &str = "result_id, analyzer_id, sample_id, test_code, result_value, units, \
     tested_at_ms, raw_line, inserted_by, created_at_ms";

const QC_COLUMNS: &str = "qc_result_id, analyzer_id, instrument_id, test_id, control_lot_id, \
     control_level, result_value, unit, measured_at_ms, created_at_ms";

pub struct PgResultStore {
    pub pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn result_from_row(row: &PgRow) -> Result<AnalyzerResultRecord, StorageError> {
    Ok(AnalyzerResultRecord {
        result_id: row.try_get("result_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        sample_id: row.try_get("sample_id")?,
        test_code: row.try_get("test_code")?,
        value: row.try_get("result_value")?,
        units: row.try_get("units")?,
        tested_at_ms: row.try_get("tested_at_ms")?,
        raw_line: row.try_get("raw_line")?,
        inserted_by: row.try_get("inserted_by")?,
        created_at_ms: row.try_get("created_at_ms")?,
    })
}

fn qc_from_row(row: &PgRow) -> Result<QcResultRecord, StorageError> {
    let control_level: String = row.try_get("control_level")?;
    Ok(QcResultRecord {
        qc_result_id: row.try_get("qc_result_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        instrument_id: row.try_get("instrument_id")?,
        test_id: row.try_get("test_id")?,
        control_lot_id: row.try_get("control_lot_id")?,
        control_level: parse_column(&control_level)?,
        value: row.try_get("result_value")?,
        unit: row.try_get("unit")?,
        measured_at_ms: row.try_get("measured_at_ms")?,
        created_at_ms: row.try_get("created_at_ms")?,
    })
}

#[async_trait::async_trait]
impl ResultStore for PgResultStore {
    async fn insert_results(
        &self,
        records: &[AnalyzerResultRecord],
    ) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for record in records {
            ensure_id(&record.result_id, "result_id")?;
            sqlx::query(&format!(
                "insert into analyzer_results ({RESULT_COLUMNS}) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
            ))
            .bind(&record.result_id)
            .bind(&record.analyzer_id)
            .bind(&record.sample_id)
            .bind(&record.test_code)
            .bind(&record.value)
            .bind(&record.units)
            .bind(record.tested_at_ms)
            .bind(&record.raw_line)
            .bind(&record.inserted_by)
            .bind(record.created_at_ms)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn find_duplicate(
        &self,
        analyzer_id: &str,
        sample_id: &str,
        test_code: &str,
        tested_at_ms: i64,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "select exists(select 1 from analyzer_results where analyzer_id = $1 and sample_id = $2 \
             and test_code = $3 and tested_at_ms = $4) as found",
        )
        .bind(analyzer_id)
        .bind(sample_id)
        .bind(test_code)
        .bind(tested_at_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("found")?)
    }

    async fn list_results(
        &self,
        analyzer_id: Option<&str>,
    ) -> Result<Vec<AnalyzerResultRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {RESULT_COLUMNS} from analyzer_results \
             where ($1::text is null or analyzer_id = $1) order by created_at_ms, result_id"
        ))
        .bind(analyzer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(result_from_row).collect()
    }

    async fn insert_qc_result(&self, record: QcResultRecord) -> Result<QcResultRecord, StorageError> {
        ensure_id(&record.qc_result_id, "qc_result_id")?;
        sqlx::query(&format!(
            "insert into qc_results ({QC_COLUMNS}) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(&record.qc_result_id)
        .bind(&record.analyzer_id)
        .bind(&record.instrument_id)
        .bind(&record.test_id)
        .bind(&record.control_lot_id)
        .bind(record.control_level.as_str())
        .bind(record.value)
        .bind(&record.unit)
        .bind(record.measured_at_ms)
        .bind(record.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_qc_results(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<QcResultRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {QC_COLUMNS} from qc_results where analyzer_id = $1 order by measured_at_ms"
        ))
        .bind(analyzer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(qc_from_row).collect()
    }
}
