//! 映射配置内存存储实现

use crate::error::StorageError;
use crate::models::{
    ActiveFieldMapping, AnalyzerFieldRecord, CustomFieldTypeRecord, FieldMappingRecord,
    QualitativeMappingRecord, UnitMappingRecord, ValidationRuleRecord,
};
use crate::traits::MappingStore;
use crate::validation::{ensure_factor, ensure_id};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct MappingTables {
    fields: HashMap<String, AnalyzerFieldRecord>,
    mappings: HashMap<String, FieldMappingRecord>,
    qualitative: HashMap<String, QualitativeMappingRecord>,
    units: HashMap<String, UnitMappingRecord>,
    custom_types: HashMap<String, CustomFieldTypeRecord>,
    rules: HashMap<String, ValidationRuleRecord>,
}

/// 映射配置内存存储
pub struct InMemoryMappingStore {
    tables: RwLock<MappingTables>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(MappingTables::default()),
        }
    }
}

impl Default for InMemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn list_active_mappings(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<ActiveFieldMapping>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<ActiveFieldMapping> = tables
            .mappings
            .values()
            .filter(|mapping| mapping.analyzer_id == analyzer_id && mapping.active)
            .filter_map(|mapping| {
                tables
                    .fields
                    .get(&mapping.analyzer_field_id)
                    .map(|field| ActiveFieldMapping {
                        mapping: mapping.clone(),
                        field: field.clone(),
                    })
            })
            .collect();
        items.sort_by(|a, b| a.mapping.mapping_id.cmp(&b.mapping.mapping_id));
        Ok(items)
    }

    async fn list_fields(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<AnalyzerFieldRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<AnalyzerFieldRecord> = tables
            .fields
            .values()
            .filter(|field| field.analyzer_id == analyzer_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.field_name.cmp(&b.field_name));
        Ok(items)
    }

    async fn find_field_by_name(
        &self,
        analyzer_id: &str,
        field_name: &str,
    ) -> Result<Option<AnalyzerFieldRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables
            .fields
            .values()
            .find(|field| field.analyzer_id == analyzer_id && field.field_name == field_name)
            .cloned())
    }

    async fn list_mappings(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<FieldMappingRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<FieldMappingRecord> = tables
            .mappings
            .values()
            .filter(|mapping| mapping.analyzer_id == analyzer_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.mapping_id.cmp(&b.mapping_id));
        Ok(items)
    }

    async fn list_qualitative_mappings(
        &self,
        field_id: &str,
    ) -> Result<Vec<QualitativeMappingRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<QualitativeMappingRecord> = tables
            .qualitative
            .values()
            .filter(|item| item.analyzer_field_id == field_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.mapping_id.cmp(&b.mapping_id));
        Ok(items)
    }

    async fn list_unit_mappings(
        &self,
        field_id: &str,
    ) -> Result<Vec<UnitMappingRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<UnitMappingRecord> = tables
            .units
            .values()
            .filter(|item| item.analyzer_field_id == field_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.mapping_id.cmp(&b.mapping_id));
        Ok(items)
    }

    async fn find_custom_field_type(
        &self,
        type_id: &str,
    ) -> Result<Option<CustomFieldTypeRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables.custom_types.get(type_id).cloned())
    }

    async fn list_validation_rules(
        &self,
        custom_field_type_id: &str,
    ) -> Result<Vec<ValidationRuleRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<ValidationRuleRecord> = tables
            .rules
            .values()
            .filter(|rule| rule.custom_field_type_id == custom_field_type_id && rule.active)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        Ok(items)
    }

    async fn upsert_field(
        &self,
        record: AnalyzerFieldRecord,
    ) -> Result<AnalyzerFieldRecord, StorageError> {
        ensure_id(&record.field_id, "field_id")?;
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tables.fields.insert(record.field_id.clone(), record.clone());
        Ok(record)
    }

    async fn upsert_mapping(
        &self,
        record: FieldMappingRecord,
    ) -> Result<FieldMappingRecord, StorageError> {
        ensure_id(&record.mapping_id, "mapping_id")?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if !tables.fields.contains_key(&record.analyzer_field_id) {
            return Err(StorageError::new("analyzer field not found"));
        }
        tables
            .mappings
            .insert(record.mapping_id.clone(), record.clone());
        Ok(record)
    }

    async fn upsert_qualitative_mapping(
        &self,
        record: QualitativeMappingRecord,
    ) -> Result<QualitativeMappingRecord, StorageError> {
        ensure_id(&record.mapping_id, "mapping_id")?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tables
            .qualitative
            .insert(record.mapping_id.clone(), record.clone());
        Ok(record)
    }

    async fn upsert_unit_mapping(
        &self,
        record: UnitMappingRecord,
    ) -> Result<UnitMappingRecord, StorageError> {
        ensure_id(&record.mapping_id, "mapping_id")?;
        ensure_factor(record.conversion_factor)?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tables.units.insert(record.mapping_id.clone(), record.clone());
        Ok(record)
    }

    async fn upsert_custom_field_type(
        &self,
        record: CustomFieldTypeRecord,
    ) -> Result<CustomFieldTypeRecord, StorageError> {
        ensure_id(&record.type_id, "type_id")?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tables
            .custom_types
            .insert(record.type_id.clone(), record.clone());
        Ok(record)
    }

    async fn upsert_validation_rule(
        &self,
        record: ValidationRuleRecord,
    ) -> Result<ValidationRuleRecord, StorageError> {
        ensure_id(&record.rule_id, "rule_id")?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tables.rules.insert(record.rule_id.clone(), record.clone());
        Ok(record)
    }

    async fn set_mapping_active(
        &self,
        mapping_id: &str,
        active: bool,
    ) -> Result<bool, StorageError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match tables.mappings.get_mut(mapping_id) {
            Some(mapping) => {
                mapping.active = active;
                mapping.version += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
