//! 传输配置内存存储实现

use crate::error::StorageError;
use crate::models::{FileImportConfigRecord, SerialPortConfigRecord};
use crate::traits::TransportConfigStore;
use crate::validation::ensure_id;
use std::collections::HashMap;
use std::sync::RwLock;

/// 文件导入/串口配置内存存储（每台仪器各一份）
pub struct InMemoryTransportConfigStore {
    file_configs: RwLock<HashMap<String, FileImportConfigRecord>>,
    serial_configs: RwLock<HashMap<String, SerialPortConfigRecord>>,
}

impl InMemoryTransportConfigStore {
    pub fn new() -> Self {
        Self {
            file_configs: RwLock::new(HashMap::new()),
            serial_configs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTransportConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TransportConfigStore for InMemoryTransportConfigStore {
    async fn list_file_import_configs(&self) -> Result<Vec<FileImportConfigRecord>, StorageError> {
        let map = self
            .file_configs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<FileImportConfigRecord> = map.values().cloned().collect();
        items.sort_by(|a, b| a.analyzer_id.cmp(&b.analyzer_id));
        Ok(items)
    }

    async fn find_file_import_config(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<FileImportConfigRecord>, StorageError> {
        let item = self
            .file_configs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(analyzer_id)
            .cloned();
        Ok(item)
    }

    async fn upsert_file_import_config(
        &self,
        record: FileImportConfigRecord,
    ) -> Result<FileImportConfigRecord, StorageError> {
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        ensure_id(&record.import_directory, "import_directory")?;
        let mut map = self
            .file_configs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.analyzer_id.clone(), record.clone());
        Ok(record)
    }

    async fn list_serial_configs(&self) -> Result<Vec<SerialPortConfigRecord>, StorageError> {
        let map = self
            .serial_configs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<SerialPortConfigRecord> = map.values().cloned().collect();
        items.sort_by(|a, b| a.analyzer_id.cmp(&b.analyzer_id));
        Ok(items)
    }

    async fn find_serial_config(
        &self,
        analyzer_id: &str,
    ) -> Result<Option<SerialPortConfigRecord>, StorageError> {
        let item = self
            .serial_configs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(analyzer_id)
            .cloned();
        Ok(item)
    }

    async fn upsert_serial_config(
        &self,
        record: SerialPortConfigRecord,
    ) -> Result<SerialPortConfigRecord, StorageError> {
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        ensure_id(&record.port_name, "port_name")?;
        let mut map = self
            .serial_configs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.analyzer_id.clone(), record.clone());
        Ok(record)
    }
}
