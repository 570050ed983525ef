//! Postgres 仪器存储实现

use super::parse_column;
use crate::error::StorageError;
use crate::models::{AnalyzerRecord, AnalyzerTypeRecord};
use crate::traits::AnalyzerStore;
use crate::validation::ensure_id;
use domain::AnalyzerStatus;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const ANALYZER_COLUMNS: &str = "analyzer_id, name, machine_id, description, location, analyzer_type_id, \
     ip_address, port, protocol_version, status, identifier_pattern, last_activated_ms";

const TYPE_COLUMNS: &str =
    "type_id, name, protocol, plugin_name, identifier_pattern, generic_plugin, active, sort_order";

pub struct PgAnalyzerStore {
    pub pool: PgPool,
}

impl PgAnalyzerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn analyzer_from_row(row: &PgRow) -> Result<AnalyzerRecord, StorageError> {
    let protocol_version: String = row.try_get("protocol_version")?;
    let status: String = row.try_get("status")?;
    Ok(AnalyzerRecord {
        analyzer_id: row.try_get("analyzer_id")?,
        name: row.try_get("name")?,
        machine_id: row.try_get("machine_id")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        analyzer_type_id: row.try_get("analyzer_type_id")?,
        ip_address: row.try_get("ip_address")?,
        port: row.try_get("port")?,
        protocol_version: parse_column(&protocol_version)?,
        status: parse_column(&status)?,
        identifier_pattern: row.try_get("identifier_pattern")?,
        last_activated_ms: row.try_get("last_activated_ms")?,
    })
}

fn type_from_row(row: &PgRow) -> Result<AnalyzerTypeRecord, StorageError> {
    Ok(AnalyzerTypeRecord {
        type_id: row.try_get("type_id")?,
        name: row.try_get("name")?,
        protocol: row.try_get("protocol")?,
        plugin_name: row.try_get("plugin_name")?,
        identifier_pattern: row.try_get("identifier_pattern")?,
        generic_plugin: row.try_get("generic_plugin")?,
        active: row.try_get("active")?,
        sort_order: row.try_get("sort_order")?,
    })
}

#[async_trait::async_trait]
impl AnalyzerStore for PgAnalyzerStore {
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {ANALYZER_COLUMNS} from analyzers order by name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(analyzer_from_row).collect()
    }

    async fn find_analyzer(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {ANALYZER_COLUMNS} from analyzers where analyzer_id = $1"
        ))
        .bind(analyzer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(analyzer_from_row).transpose()
    }

    async fn find_analyzer_by_name(
        &self,
        name: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query(&format!(
            "select {ANALYZER_COLUMNS} from analyzers where lower(trim(name)) = lower($1) limit 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(analyzer_from_row).transpose()
    }

    async fn find_analyzer_by_ip(
        &self,
        ip_address: &str,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let ip_address = ip_address.trim();
        if ip_address.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query(&format!(
            "select {ANALYZER_COLUMNS} from analyzers where trim(ip_address) = $1 limit 1"
        ))
        .bind(ip_address)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(analyzer_from_row).transpose()
    }

    async fn upsert_analyzer(&self, record: AnalyzerRecord) -> Result<AnalyzerRecord, StorageError> {
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        sqlx::query(
            "insert into analyzers (analyzer_id, name, machine_id, description, location, analyzer_type_id, \
             ip_address, port, protocol_version, status, identifier_pattern, last_activated_ms) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             on conflict (analyzer_id) do update set \
             name = excluded.name, machine_id = excluded.machine_id, description = excluded.description, \
             location = excluded.location, analyzer_type_id = excluded.analyzer_type_id, \
             ip_address = excluded.ip_address, port = excluded.port, \
             protocol_version = excluded.protocol_version, status = excluded.status, \
             identifier_pattern = excluded.identifier_pattern, last_activated_ms = excluded.last_activated_ms",
        )
        .bind(&record.analyzer_id)
        .bind(&record.name)
        .bind(&record.machine_id)
        .bind(&record.description)
        .bind(&record.location)
        .bind(&record.analyzer_type_id)
        .bind(&record.ip_address)
        .bind(record.port)
        .bind(record.protocol_version.as_str())
        .bind(record.status.as_str())
        .bind(&record.identifier_pattern)
        .bind(record.last_activated_ms)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_analyzer_status(
        &self,
        analyzer_id: &str,
        status: AnalyzerStatus,
        last_activated_ms: Option<i64>,
    ) -> Result<Option<AnalyzerRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "update analyzers set status = $1, \
             last_activated_ms = coalesce($2, last_activated_ms) \
             where analyzer_id = $3 returning {ANALYZER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(last_activated_ms)
        .bind(analyzer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(analyzer_from_row).transpose()
    }

    async fn list_analyzer_types(&self) -> Result<Vec<AnalyzerTypeRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {TYPE_COLUMNS} from analyzer_types order by sort_order, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(type_from_row).collect()
    }

    async fn find_analyzer_type(
        &self,
        type_id: &str,
    ) -> Result<Option<AnalyzerTypeRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {TYPE_COLUMNS} from analyzer_types where type_id = $1"
        ))
        .bind(type_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(type_from_row).transpose()
    }

    async fn upsert_analyzer_type(
        &self,
        record: AnalyzerTypeRecord,
    ) -> Result<AnalyzerTypeRecord, StorageError> {
        ensure_id(&record.type_id, "type_id")?;
        sqlx::query(
            "insert into analyzer_types (type_id, name, protocol, plugin_name, identifier_pattern, \
             generic_plugin, active, sort_order) values ($1, $2, $3, $4, $5, $6, $7, $8) \
             on conflict (type_id) do update set name = excluded.name, protocol = excluded.protocol, \
             plugin_name = excluded.plugin_name, identifier_pattern = excluded.identifier_pattern, \
             generic_plugin = excluded.generic_plugin, active = excluded.active, \
             sort_order = excluded.sort_order",
        )
        .bind(&record.type_id)
        .bind(&record.name)
        .bind(&record.protocol)
        .bind(&record.plugin_name)
        .bind(&record.identifier_pattern)
        .bind(record.generic_plugin)
        .bind(record.active)
        .bind(record.sort_order)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }
}
