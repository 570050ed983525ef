//! Postgres 映射配置存储实现

use super::parse_column;
use crate::error::StorageError;
use crate::models::{
    ActiveFieldMapping, AnalyzerFieldRecord, CustomFieldTypeRecord, FieldMappingRecord,
    QualitativeMappingRecord, UnitMappingRecord, ValidationRuleRecord,
};
use crate::traits::MappingStore;
use crate::validation::{ensure_factor, ensure_id};
use domain::{MappingTarget, TargetKind};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const FIELD_COLUMNS: &str =
    "field_id, analyzer_id, field_name, astm_ref, field_type, unit, custom_field_type_id, active";

const MAPPING_COLUMNS: &str = "mapping_id, analyzer_id, analyzer_field_id, target_kind, target_id, \
     mapping_type, is_required, is_active, specimen_type_constraint, panel_constraint, version";

pub struct PgMappingStore {
    pub pool: PgPool,
}

impl PgMappingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn field_from_row(row: &PgRow) -> Result<AnalyzerFieldRecord, StorageError> {
    let field_type: String = row.try_get("field_type")?;
    Ok(AnalyzerFieldRecord {
        field_id: row.try_get("field_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        field_name: row.try_get("field_name")?,
        astm_ref: row.try_get("astm_ref")?,
        field_type: parse_column(&field_type)?,
        unit: row.try_get("unit")?,
        custom_field_type_id: row.try_get("custom_field_type_id")?,
        active: row.try_get("active")?,
    })
}

fn mapping_from_row(row: &PgRow) -> Result<FieldMappingRecord, StorageError> {
    let target_kind: String = row.try_get("target_kind")?;
    let target_id: String = row.try_get("target_id")?;
    let mapping_type: String = row.try_get("mapping_type")?;
    Ok(FieldMappingRecord {
        mapping_id: row.try_get("mapping_id")?,
        analyzer_id: row.try_get("analyzer_id")?,
        analyzer_field_id: row.try_get("analyzer_field_id")?,
        target: MappingTarget::new(parse_column::<TargetKind>(&target_kind)?, target_id),
        mapping_type: parse_column(&mapping_type)?,
        required: row.try_get("is_required")?,
        active: row.try_get("is_active")?,
        specimen_type_constraint: row.try_get("specimen_type_constraint")?,
        panel_constraint: row.try_get("panel_constraint")?,
        version: row.try_get("version")?,
    })
}

#[async_trait::async_trait]
impl MappingStore for PgMappingStore {
    async fn list_active_mappings(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<ActiveFieldMapping>, StorageError> {
        let rows = sqlx::query(
            "select m.mapping_id, m.analyzer_id, m.analyzer_field_id, m.target_kind, m.target_id, \
             m.mapping_type, m.is_required, m.is_active, m.specimen_type_constraint, m.panel_constraint, \
             m.version, f.field_id, f.field_name, f.astm_ref, f.field_type, f.unit, \
             f.custom_field_type_id, f.active \
             from analyzer_field_mappings m \
             join analyzer_fields f on f.field_id = m.analyzer_field_id \
             where m.analyzer_id = $1 and m.is_active = true order by m.mapping_id",
        )
        .bind(analyzer_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ActiveFieldMapping {
                mapping: mapping_from_row(&row)?,
                field: field_from_row(&row)?,
            });
        }
        Ok(items)
    }

    async fn list_fields(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<AnalyzerFieldRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {FIELD_COLUMNS} from analyzer_fields where analyzer_id = $1 order by field_name"
        ))
        .bind(analyzer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(field_from_row).collect()
    }

    async fn find_field_by_name(
        &self,
        analyzer_id: &str,
        field_name: &str,
    ) -> Result<Option<AnalyzerFieldRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {FIELD_COLUMNS} from analyzer_fields where analyzer_id = $1 and field_name = $2"
        ))
        .bind(analyzer_id)
        .bind(field_name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(field_from_row).transpose()
    }

    async fn list_mappings(
        &self,
        analyzer_id: &str,
    ) -> Result<Vec<FieldMappingRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {MAPPING_COLUMNS} from analyzer_field_mappings where analyzer_id = $1 order by mapping_id"
        ))
        .bind(analyzer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(mapping_from_row).collect()
    }

    async fn list_qualitative_mappings(
        &self,
        field_id: &str,
    ) -> Result<Vec<QualitativeMappingRecord>, StorageError> {
        let rows = sqlx::query(
            "select mapping_id, analyzer_field_id, analyzer_value, canonical_code, is_default \
             from qualitative_result_mappings where analyzer_field_id = $1 order by mapping_id",
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(QualitativeMappingRecord {
                mapping_id: row.try_get("mapping_id")?,
                analyzer_field_id: row.try_get("analyzer_field_id")?,
                analyzer_value: row.try_get("analyzer_value")?,
                canonical_code: row.try_get("canonical_code")?,
                is_default: row.try_get("is_default")?,
            });
        }
        Ok(items)
    }

    async fn list_unit_mappings(
        &self,
        field_id: &str,
    ) -> Result<Vec<UnitMappingRecord>, StorageError> {
        let rows = sqlx::query(
            "select mapping_id, analyzer_field_id, analyzer_unit, canonical_unit, conversion_factor, \
             reject_if_mismatch from unit_mappings where analyzer_field_id = $1 order by mapping_id",
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(UnitMappingRecord {
                mapping_id: row.try_get("mapping_id")?,
                analyzer_field_id: row.try_get("analyzer_field_id")?,
                analyzer_unit: row.try_get("analyzer_unit")?,
                canonical_unit: row.try_get("canonical_unit")?,
                conversion_factor: row.try_get("conversion_factor")?,
                reject_if_mismatch: row.try_get("reject_if_mismatch")?,
            });
        }
        Ok(items)
    }

    async fn find_custom_field_type(
        &self,
        type_id: &str,
    ) -> Result<Option<CustomFieldTypeRecord>, StorageError> {
        let row = sqlx::query(
            "select type_id, type_name, display_name, validation_pattern, value_range_min, \
             value_range_max, allowed_characters, active from custom_field_types where type_id = $1",
        )
        .bind(type_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(CustomFieldTypeRecord {
            type_id: row.try_get("type_id")?,
            type_name: row.try_get("type_name")?,
            display_name: row.try_get("display_name")?,
            validation_pattern: row.try_get("validation_pattern")?,
            value_range_min: row.try_get("value_range_min")?,
            value_range_max: row.try_get("value_range_max")?,
            allowed_characters: row.try_get("allowed_characters")?,
            active: row.try_get("active")?,
        }))
    }

    async fn list_validation_rules(
        &self,
        custom_field_type_id: &str,
    ) -> Result<Vec<ValidationRuleRecord>, StorageError> {
        let rows = sqlx::query(
            "select rule_id, custom_field_type_id, rule_name, rule_type, rule_expression, error_message, \
             active from validation_rules where custom_field_type_id = $1 and active = true \
             order by rule_id",
        )
        .bind(custom_field_type_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let rule_type: String = row.try_get("rule_type")?;
            items.push(ValidationRuleRecord {
                rule_id: row.try_get("rule_id")?,
                custom_field_type_id: row.try_get("custom_field_type_id")?,
                rule_name: row.try_get("rule_name")?,
                rule_type: parse_column(&rule_type)?,
                rule_expression: row.try_get("rule_expression")?,
                error_message: row.try_get("error_message")?,
                active: row.try_get("active")?,
            });
        }
        Ok(items)
    }

    async fn upsert_field(
        &self,
        record: AnalyzerFieldRecord,
    ) -> Result<AnalyzerFieldRecord, StorageError> {
        ensure_id(&record.field_id, "field_id")?;
        ensure_id(&record.analyzer_id, "analyzer_id")?;
        sqlx::query(
            "insert into analyzer_fields (field_id, analyzer_id, field_name, astm_ref, field_type, unit, \
             custom_field_type_id, active) values ($1, $2, $3, $4, $5, $6, $7, $8) \
             on conflict (field_id) do update set field_name = excluded.field_name, \
             astm_ref = excluded.astm_ref, field_type = excluded.field_type, unit = excluded.unit, \
             custom_field_type_id = excluded.custom_field_type_id, active = excluded.active",
        )
        .bind(&record.field_id)
        .bind(&record.analyzer_id)
        .bind(&record.field_name)
        .bind(&record.astm_ref)
        .bind(record.field_type.as_str())
        .bind(&record.unit)
        .bind(&record.custom_field_type_id)
        .bind(record.active)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_mapping(
        &self,
        record: FieldMappingRecord,
    ) -> Result<FieldMappingRecord, StorageError> {
        ensure_id(&record.mapping_id, "mapping_id")?;
        sqlx::query(
            "insert into analyzer_field_mappings (mapping_id, analyzer_id, analyzer_field_id, target_kind, \
             target_id, mapping_type, is_required, is_active, specimen_type_constraint, panel_constraint, \
             version) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             on conflict (mapping_id) do update set target_kind = excluded.target_kind, \
             target_id = excluded.target_id, mapping_type = excluded.mapping_type, \
             is_required = excluded.is_required, is_active = excluded.is_active, \
             specimen_type_constraint = excluded.specimen_type_constraint, \
             panel_constraint = excluded.panel_constraint, \
             version = analyzer_field_mappings.version + 1",
        )
        .bind(&record.mapping_id)
        .bind(&record.analyzer_id)
        .bind(&record.analyzer_field_id)
        .bind(record.target.kind().as_str())
        .bind(record.target.id())
        .bind(record.mapping_type.as_str())
        .bind(record.required)
        .bind(record.active)
        .bind(&record.specimen_type_constraint)
        .bind(&record.panel_constraint)
        .bind(record.version)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_qualitative_mapping(
        &self,
        record: QualitativeMappingRecord,
    ) -> Result<QualitativeMappingRecord, StorageError> {
        ensure_id(&record.mapping_id, "mapping_id")?;
        sqlx::query(
            "insert into qualitative_result_mappings (mapping_id, analyzer_field_id, analyzer_value, \
             canonical_code, is_default) values ($1, $2, $3, $4, $5) \
             on conflict (mapping_id) do update set analyzer_value = excluded.analyzer_value, \
             canonical_code = excluded.canonical_code, is_default = excluded.is_default",
        )
        .bind(&record.mapping_id)
        .bind(&record.analyzer_field_id)
        .bind(&record.analyzer_value)
        .bind(&record.canonical_code)
        .bind(record.is_default)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_unit_mapping(
        &self,
        record: UnitMappingRecord,
    ) -> Result<UnitMappingRecord, StorageError> {
        ensure_id(&record.mapping_id, "mapping_id")?;
        ensure_factor(record.conversion_factor)?;
        sqlx::query(
            "insert into unit_mappings (mapping_id, analyzer_field_id, analyzer_unit, canonical_unit, \
             conversion_factor, reject_if_mismatch) values ($1, $2, $3, $4, $5, $6) \
             on conflict (mapping_id) do update set analyzer_unit = excluded.analyzer_unit, \
             canonical_unit = excluded.canonical_unit, conversion_factor = excluded.conversion_factor, \
             reject_if_mismatch = excluded.reject_if_mismatch",
        )
        .bind(&record.mapping_id)
        .bind(&record.analyzer_field_id)
        .bind(&record.analyzer_unit)
        .bind(&record.canonical_unit)
        .bind(record.conversion_factor)
        .bind(record.reject_if_mismatch)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_custom_field_type(
        &self,
        record: CustomFieldTypeRecord,
    ) -> Result<CustomFieldTypeRecord, StorageError> {
        ensure_id(&record.type_id, "type_id")?;
        sqlx::query(
            "insert into custom_field_types (type_id, type_name, display_name, validation_pattern, \
             value_range_min, value_range_max, allowed_characters, active) \
             values ($1, $2, $3, $4, $5, $6, $7, $8) \
             on conflict (type_id) do update set type_name = excluded.type_name, \
             display_name = excluded.display_name, validation_pattern = excluded.validation_pattern, \
             value_range_min = excluded.value_range_min, value_range_max = excluded.value_range_max, \
             allowed_characters = excluded.allowed_characters, active = excluded.active",
        )
        .bind(&record.type_id)
        .bind(&record.type_name)
        .bind(&record.display_name)
        .bind(&record.validation_pattern)
        .bind(record.value_range_min)
        .bind(record.value_range_max)
        .bind(&record.allowed_characters)
        .bind(record.active)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_validation_rule(
        &self,
        record: ValidationRuleRecord,
    ) -> Result<ValidationRuleRecord, StorageError> {
        ensure_id(&record.rule_id, "rule_id")?;
        sqlx::query(
            "insert into validation_rules (rule_id, custom_field_type_id, rule_name, rule_type, \
             rule_expression, error_message, active) values ($1, $2, $3, $4, $5, $6, $7) \
             on conflict (rule_id) do update set rule_name = excluded.rule_name, \
             rule_type = excluded.rule_type, rule_expression = excluded.rule_expression, \
             error_message = excluded.error_message, active = excluded.active",
        )
        .bind(&record.rule_id)
        .bind(&record.custom_field_type_id)
        .bind(&record.rule_name)
        .bind(record.rule_type.as_str())
        .bind(&record.rule_expression)
        .bind(&record.error_message)
        .bind(record.active)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn set_mapping_active(
        &self,
        mapping_id: &str,
        active: bool,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update analyzer_field_mappings set is_active = $1, version = version + 1 \
             where mapping_id = $2",
        )
        .bind(active)
        .bind(mapping_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
