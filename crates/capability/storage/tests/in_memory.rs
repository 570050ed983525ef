use domain::{
    AnalyzerStatus, ErrorStatus, ErrorType, FieldType, MappingTarget, MappingType, Severity,
};
use lis_storage::{
    AnalyzerErrorRecord, AnalyzerErrorStore, AnalyzerErrorUpdate, AnalyzerFieldRecord,
    AnalyzerRecord, AnalyzerResultRecord, AnalyzerStore, ErrorFilter, FieldMappingRecord,
    InMemoryAnalyzerErrorStore, InMemoryAnalyzerStore, InMemoryMappingStore, InMemoryResultStore,
    MappingStore, ResultStore, UnitMappingRecord,
};

fn field(field_id: &str, name: &str) -> AnalyzerFieldRecord {
    AnalyzerFieldRecord {
        field_id: field_id.to_string(),
        analyzer_id: "an-1".to_string(),
        field_name: name.to_string(),
        astm_ref: None,
        field_type: FieldType::Numeric,
        unit: None,
        custom_field_type_id: None,
        active: true,
    }
}

fn mapping(mapping_id: &str, field_id: &str, active: bool) -> FieldMappingRecord {
    FieldMappingRecord {
        mapping_id: mapping_id.to_string(),
        analyzer_id: "an-1".to_string(),
        analyzer_field_id: field_id.to_string(),
        target: MappingTarget::Test("TEST-GLU".to_string()),
        mapping_type: MappingType::TestLevel,
        required: false,
        active,
        specimen_type_constraint: None,
        panel_constraint: None,
        version: 0,
    }
}

fn error(error_id: &str, severity: Severity, created_at_ms: i64) -> AnalyzerErrorRecord {
    AnalyzerErrorRecord {
        error_id: error_id.to_string(),
        analyzer_id: Some("an-1".to_string()),
        error_type: ErrorType::Mapping,
        severity,
        error_message: "unmapped".to_string(),
        raw_message: "R|1|^^^GLU|5.5".to_string(),
        status: ErrorStatus::Unacknowledged,
        acknowledged_by: None,
        acknowledged_at_ms: None,
        resolved_at_ms: None,
        created_at_ms,
    }
}

#[tokio::test]
async fn analyzer_lookup_by_name_and_ip() {
    let store = InMemoryAnalyzerStore::new();
    let mut record = AnalyzerRecord::new("an-1", "Mindray BS-200");
    record.ip_address = Some("10.0.0.5".to_string());
    store.upsert_analyzer(record).await.expect("upsert");

    let by_name = store
        .find_analyzer_by_name("  mindray bs-200 ")
        .await
        .expect("query");
    assert_eq!(by_name.map(|item| item.analyzer_id), Some("an-1".to_string()));

    let by_ip = store.find_analyzer_by_ip("10.0.0.5").await.expect("query");
    assert!(by_ip.is_some());
    assert!(store.find_analyzer_by_ip("").await.expect("query").is_none());
}

#[tokio::test]
async fn status_update_keeps_last_activated_when_absent() {
    let store = InMemoryAnalyzerStore::new();
    store
        .upsert_analyzer(AnalyzerRecord::new("an-1", "A"))
        .await
        .expect("upsert");
    store
        .update_analyzer_status("an-1", AnalyzerStatus::Active, Some(1_000))
        .await
        .expect("update");
    let updated = store
        .update_analyzer_status("an-1", AnalyzerStatus::ErrorPending, None)
        .await
        .expect("update")
        .expect("analyzer");
    assert_eq!(updated.status, AnalyzerStatus::ErrorPending);
    assert_eq!(updated.last_activated_ms, Some(1_000));

    let missing = store
        .update_analyzer_status("missing", AnalyzerStatus::Active, None)
        .await
        .expect("update");
    assert!(missing.is_none());
}

#[tokio::test]
async fn only_active_mappings_are_listed() {
    let store = InMemoryMappingStore::new();
    store.upsert_field(field("f-1", "GLU")).await.expect("field");
    store.upsert_field(field("f-2", "CHOL")).await.expect("field");
    store
        .upsert_mapping(mapping("m-1", "f-1", true))
        .await
        .expect("mapping");
    store
        .upsert_mapping(mapping("m-2", "f-2", false))
        .await
        .expect("mapping");

    let active = store.list_active_mappings("an-1").await.expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].field.field_name, "GLU");

    assert!(store.set_mapping_active("m-2", true).await.expect("toggle"));
    let active = store.list_active_mappings("an-1").await.expect("list");
    assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn mapping_requires_existing_field() {
    let store = InMemoryMappingStore::new();
    let result = store.upsert_mapping(mapping("m-1", "nope", true)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn unit_mapping_rejects_non_positive_factor() {
    let store = InMemoryMappingStore::new();
    let record = UnitMappingRecord {
        mapping_id: "u-1".to_string(),
        analyzer_field_id: "f-1".to_string(),
        analyzer_unit: "mg/dL".to_string(),
        canonical_unit: "mmol/L".to_string(),
        conversion_factor: Some(0.0),
        reject_if_mismatch: false,
    };
    assert!(store.upsert_unit_mapping(record).await.is_err());
}

#[tokio::test]
async fn error_update_and_statistics() {
    let store = InMemoryAnalyzerErrorStore::new();
    let now = 10 * 24 * 60 * 60 * 1000;
    store
        .insert_error(error("e-1", Severity::Critical, now - 1_000))
        .await
        .expect("insert");
    store
        .insert_error(error("e-2", Severity::Error, now - 3 * 24 * 60 * 60 * 1000))
        .await
        .expect("insert");
    assert!(store.insert_error(error("e-1", Severity::Error, now)).await.is_err());

    let updated = store
        .update_error(
            "e-2",
            AnalyzerErrorUpdate {
                status: Some(ErrorStatus::Acknowledged),
                acknowledged_by: Some("tech".to_string()),
                acknowledged_at_ms: Some(now),
                ..Default::default()
            },
        )
        .await
        .expect("update")
        .expect("record");
    assert_eq!(updated.status, ErrorStatus::Acknowledged);
    assert_eq!(updated.acknowledged_by.as_deref(), Some("tech"));

    let stats = store.error_statistics(now).await.expect("stats");
    assert_eq!(stats.total_errors, 2);
    assert_eq!(stats.unacknowledged, 1);
    assert_eq!(stats.critical, 1);
    assert_eq!(stats.last_24_hours, 1);
    assert_eq!(store.count_unacknowledged("an-1").await.expect("count"), 1);

    let filtered = store
        .list_errors(&ErrorFilter {
            status: Some(ErrorStatus::Unacknowledged),
            ..Default::default()
        })
        .await
        .expect("list");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].error_id, "e-1");
}

#[tokio::test]
async fn duplicate_lookup_matches_all_keys() {
    let store = InMemoryResultStore::new();
    let record = AnalyzerResultRecord {
        result_id: "r-1".to_string(),
        analyzer_id: Some("an-1".to_string()),
        sample_id: "S1".to_string(),
        test_code: "GLU".to_string(),
        value: "5.5".to_string(),
        units: Some("mmol/L".to_string()),
        tested_at_ms: Some(42),
        raw_line: "R|1|^^^GLU|5.5".to_string(),
        inserted_by: "SYSTEM".to_string(),
        created_at_ms: 50,
    };
    assert_eq!(store.insert_results(&[record]).await.expect("insert"), 1);
    assert!(store.find_duplicate("an-1", "S1", "GLU", 42).await.expect("dup"));
    assert!(!store.find_duplicate("an-1", "S1", "GLU", 43).await.expect("dup"));
    assert!(!store.find_duplicate("an-2", "S1", "GLU", 42).await.expect("dup"));
    assert_eq!(store.len(), 1);
}
