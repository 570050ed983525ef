//! Postgres 传输配置存储实现
//!
//! 列映射按配置顺序以 `列名=字段名` 行文本保存。

use super::parse_column;
use crate::error::StorageError;
use crate::models::{ColumnMapping, FileImportConfigRecord, SerialPortConfigRecord};
use crate::traits::TransportConfigStore;
use crate::validation::ensure_id;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const FILE_COLUMNS: &str = "config_id, analyzer_id, import_directory, file_pattern, archive_directory, \
     error_directory, column_mappings, delimiter, has_header, active";

const SERIAL_COLUMNS: &str =
    "config_id, analyzer_id, port_name, baud_rate, data_bits, stop_bits, parity, flow_control, active";

pub struct PgTransportConfigStore {
    pub pool: PgPool,
}

impl PgTransportConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

/// 列映射编码为 `col=field` 行，每行一个。
fn encode_column_mappings(mappings: &[ColumnMapping]) -> String {
    mappings
        .iter()
        .map(|item| format!("{}={}", item.column, item.field))
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_column_mappings(value: &str) -> Vec<ColumnMapping> {
    value
        .lines()
        .filter_map(|line| {
            let (column, field) = line.split_once('=')?;
            Some(ColumnMapping {
                column: column.to_string(),
                field: field.to_string(),
            })
        })
        .collect()
}

fn file_from_row(row: &PgRow) -> Result<FileImportConfigRecord, StorageError> {
    let column_mappings: String = row.try_get("column_mappings")?;
    let delimiter: String = row.try_get("delimiter")?;
    Ok(FileImportConfigRecord {
        config_id: row.try_get("config_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        import_directory: row.try_get("import_directory")?,
        file_pattern: row.try_get("file_pattern")?,
        archive_directory: row.try_get("archive_directory")?,
        error_directory: row.try_get("error_directory")?,
        column_mappings: decode_column_mappings(&column_mappings),
        delimiter: delimiter.chars().next().unwrap_or(','),
        has_header: row.try_get("has_header")?,
        active: row.try_get("active")?,
    })
}

fn serial_from_row(row: &PgRow) -> Result<SerialPortConfigRecord, StorageError> {
    let baud_rate: i32 = row.try_get("baud_rate")?;
    let data_bits: i16 = row.try_get("data_bits")?;
    let stop_bits: String = row.try_get("stop_bits")?;
    let parity: String = row.try_get("parity")?;
    let flow_control: String = row.try_get("flow_control")?;
    Ok(SerialPortConfigRecord {
        config_id: row.try_get("config_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        port_name: row.try_get("port_name")?,
        baud_rate: u32::try_from(baud_rate).map_err(|_| StorageError::new("invalid baud_rate"))?,
        data_bits: u8::try_from(data_bits).map_err(|_| StorageError::new("invalid data_bits"))?,
        stop_bits: parse_column(&stop_bits)?,
        parity: parse_column(&parity)?,
        flow_control: parse_column(&flow_control)?,
        active: row.try_get("active")?,
    })
}

#[async_trait::async_trait]
impl TransportConfigStore for PgTransportConfigStore {
    async fn list_file_import_configs(&self) -> Result<Vec<FileImportConfigRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {FILE_COLUMNS} from file_import_configs order by analyzer_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(file_from_row).collect()
    }

    async fn find_file_import_config(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<FileImportConfigRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {FILE_COLUMNS} from file_import_configs where analyzer_id = $1"
        ))
        .bind(analyzer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(file_from_row).transpose()
    }

    async fn upsert_file_import_config(
        &self,
        record: FileImportConfigRecord,
    ) -> Result<FileImportConfigRecord, StorageError> {
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        ensure_id(&record.import_directory, "import_directory")?;
        sqlx::query(&format!(
            "insert into file_import_configs ({FILE_COLUMNS}) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             on conflict (analyzer_id) do update set import_directory = excluded.import_directory, \
             file_pattern = excluded.file_pattern, archive_directory = excluded.archive_directory, \
             error_directory = excluded.error_directory, column_mappings = excluded.column_mappings, \
             delimiter = excluded.delimiter, has_header = excluded.has_header, active = excluded.active"
        ))
        .bind(&record.config_id)
        .bind(&record.analyzer_id)
        .bind(&record.import_directory)
        .bind(&record.file_pattern)
        .bind(&record.archive_directory)
        .bind(&record.error_directory)
        .bind(encode_column_mappings(&record.column_mappings))
        .bind(record.delimiter.to_string())
        .bind(record.has_header)
        .bind(record.active)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_serial_configs(&self) -> Result<Vec<SerialPortConfigRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {SERIAL_COLUMNS} from serial_port_configs order by analyzer_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(serial_from_row).collect()
    }

    async fn find_serial_config(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<SerialPortConfigRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {SERIAL_COLUMNS} from serial_port_configs where analyzer_id = $1"
        ))
        .bind(analyzer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(serial_from_row).transpose()
    }

    async fn upsert_serial_config(
        &self,
        record: SerialPortConfigRecord,
    ) -> Result<SerialPortConfigRecord, StorageError> {
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        ensure_id(&record.port_name, "port_name")?;
        sqlx::query(&format!(
            "insert into serial_port_configs ({SERIAL_COLUMNS}) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             on conflict (analyzer_id) do update set port_name = excluded.port_name, \
             baud_rate = excluded.baud_rate, data_bits = excluded.data_bits, \
             stop_bits = excluded.stop_bits, parity = excluded.parity, \
             flow_control = excluded.flow_control, active = excluded.active"
        ))
        .bind(&record.config_id)
        .bind(&record.analyzer_id)
        .bind(&record.port_name)
        .bind(record.baud_rate as i32)
        .bind(i16::from(record.data_bits))
        .bind(record.stop_bits.as_str())
        .bind(record.parity.as_str())
        .bind(record.flow_control.as_str())
        .bind(record.active)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }
}
