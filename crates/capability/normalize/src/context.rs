//! 映射上下文：某台仪器的全部生效映射，按报文逐条加载

use crate::error::MappingError;
use async_trait::async_trait;
use domain::TargetKind;
use lis_storage::{
    AnalyzerFieldRecord, CustomFieldTypeRecord, FieldMappingRecord, MappingStore,
    QualitativeMappingRecord, UnitMappingRecord, ValidationRuleRecord,
};
use std::sync::Arc;

/// 一条生效映射及其字段上的值/单位映射与校验规则。
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub mapping: FieldMappingRecord,
    pub field: AnalyzerFieldRecord,
    pub qualitative: Vec<QualitativeMappingRecord>,
    pub units: Vec<UnitMappingRecord>,
    pub custom_type: Option<CustomFieldTypeRecord>,
    pub rules: Vec<ValidationRuleRecord>,
}

impl FieldMapping {
    pub fn new(mapping: FieldMappingRecord, field: AnalyzerFieldRecord) -> Self {
        Self {
            mapping,
            field,
            qualitative: Vec::new(),
            units: Vec::new(),
            custom_type: None,
            rules: Vec::new(),
        }
    }

    pub fn with_qualitative(mut self, records: Vec<QualitativeMappingRecord>) -> Self {
        self.qualitative = records;
        self
    }

    pub fn with_units(mut self, records: Vec<UnitMappingRecord>) -> Self {
        self.units = records;
        self
    }

    pub fn with_custom_type(
        mut self,
        custom_type: CustomFieldTypeRecord,
        rules: Vec<ValidationRuleRecord>,
    ) -> Self {
        self.custom_type = Some(custom_type);
        self.rules = rules;
        self
    }

    /// 报文代码是否指向此字段（字段名或 ASTM 引用，忽略大小写）。
    pub fn matches_code(&self, code: &str) -> bool {
        let code = code.trim();
        self.field.field_name.eq_ignore_ascii_case(code)
            || self
                .field
                .astm_ref
                .as_deref()
                .is_some_and(|reference| reference.trim().eq_ignore_ascii_case(code))
    }
}

/// 仪器的映射上下文。只保存 `active = true` 的映射。
#[derive(Debug, Clone, Default)]
pub struct MappingContext {
    analyzer_id: String,
    mappings: Vec<FieldMapping>,
}

impl MappingContext {
    pub fn new(analyzer_id: impl Into<String>, mappings: Vec<FieldMapping>) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            mappings: mappings
                .into_iter()
                .filter(|item| item.mapping.active)
                .collect(),
        }
    }

    pub fn empty(analyzer_id: impl Into<String>) -> Self {
        Self::new(analyzer_id, Vec::new())
    }

    pub fn analyzer_id(&self) -> &str {
        &self.analyzer_id
    }

    pub fn has_active_mappings(&self) -> bool {
        !self.mappings.is_empty()
    }

    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// 报文代码对应的全部映射（按配置顺序）。
    pub fn mappings_for(&self, code: &str) -> Vec<&FieldMapping> {
        self.mappings
            .iter()
            .filter(|item| item.matches_code(code))
            .collect()
    }

    /// 报文代码上指定目标类型的第一条映射。
    pub fn find_target(&self, code: &str, kind: TargetKind) -> Option<&FieldMapping> {
        self.mappings
            .iter()
            .find(|item| item.mapping.target.kind() == kind && item.matches_code(code))
    }
}

/// 映射上下文提供者抽象。
#[async_trait]
pub trait MappingProvider: Send + Sync {
    async fn load_context(&self, analyzer_id: &str) -> Result<MappingContext, MappingError>;
}

/// 基于 storage 的映射上下文提供者。
#[derive(Clone)]
pub struct StorageMappingProvider {
    store: Arc<dyn MappingStore>,
}

impl StorageMappingProvider {
    pub fn new(store: Arc<dyn MappingStore>) -> Self {
        Self { store }
    }

    async fn resolve(
        &self,
        mapping: FieldMappingRecord,
        field: AnalyzerFieldRecord,
    ) -> Result<FieldMapping, MappingError> {
        let qualitative = self.store.list_qualitative_mappings(&field.field_id).await?;
        let units = self.store.list_unit_mappings(&field.field_id).await?;
        let mut resolved = FieldMapping::new(mapping, field)
            .with_qualitative(qualitative)
            .with_units(units);

        if let Some(type_id) = resolved.field.custom_field_type_id.clone() {
            let custom_type = self
                .store
                .find_custom_field_type(&type_id)
                .await?
                .filter(|record| record.active);
            if let Some(custom_type) = custom_type {
                let rules = self.store.list_validation_rules(&type_id).await?;
                resolved = resolved.with_custom_type(custom_type, rules);
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl MappingProvider for StorageMappingProvider {
    async fn load_context(&self, analyzer_id: &str) -> Result<MappingContext, MappingError> {
        let active = self.store.list_active_mappings(analyzer_id).await?;
        let mut mappings = Vec::with_capacity(active.len());
        for item in active {
            if !item.mapping.active || !item.field.active {
                continue;
            }
            mappings.push(self.resolve(item.mapping, item.field).await?);
        }
        Ok(MappingContext::new(analyzer_id, mappings))
    }
}
