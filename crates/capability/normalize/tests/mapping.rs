use async_trait::async_trait;
use domain::{ErrorType, FieldType, MappingTarget, MappingType, Severity};
use lis_normalize::{
    ErrorRecorder, InserterStrategy, MappingContext, MappingError, MappingProvider,
    NewAnalyzerError, QcProcessor, StorageMappingProvider, ensure_preview_size, preview,
};
use lis_plugin::{InsertContext, InsertError, LineInserter, ResultStoreInserter};
use lis_protocol::MessageLayout;
use lis_storage::{
    AnalyzerFieldRecord, FieldMappingRecord, InMemoryMappingStore, InMemoryResultStore,
    MappingStore, QualitativeMappingRecord, ResultStore, UnitMappingRecord,
};
use std::sync::{Arc, Mutex};

const ANALYZER: &str = "analyzer-1";

#[derive(Default)]
struct CollectingRecorder {
    errors: Mutex<Vec<NewAnalyzerError>>,
}

impl CollectingRecorder {
    fn errors(&self) -> Vec<NewAnalyzerError> {
        self.errors.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ErrorRecorder for CollectingRecorder {
    async fn record(&self, error: NewAnalyzerError) -> Result<String, MappingError> {
        let mut errors = self.errors.lock().expect("lock");
        errors.push(error);
        Ok(format!("error-{}", errors.len()))
    }
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|line| line.to_string()).collect()
}

fn glucose_message(value: &str, unit: &str) -> Vec<String> {
    lines(&[
        "H|\\^&|||ACME^X100^1.0|||||||P|1",
        "P|1",
        "O|1|S-001||^^^GLU|R||||||||||SERUM",
        &format!("R|1|^^^GLUCOSE|{value}|{unit}||N||F||||20240115103000"),
        "R|2|^^^HIV|pos|||N||F||||20240115103000",
        "L|1|N",
    ])
}

fn field(id: &str, name: &str, field_type: FieldType) -> AnalyzerFieldRecord {
    AnalyzerFieldRecord {
        field_id: id.to_string(),
        analyzer_id: ANALYZER.to_string(),
        field_name: name.to_string(),
        astm_ref: None,
        field_type,
        unit: None,
        custom_field_type_id: None,
        active: true,
    }
}

fn mapping(id: &str, field_id: &str, target: MappingTarget, required: bool) -> FieldMappingRecord {
    FieldMappingRecord {
        mapping_id: id.to_string(),
        analyzer_id: ANALYZER.to_string(),
        analyzer_field_id: field_id.to_string(),
        target,
        mapping_type: MappingType::TestLevel,
        required,
        active: true,
        specimen_type_constraint: None,
        panel_constraint: None,
        version: 1,
    }
}

async fn seeded_store() -> Arc<InMemoryMappingStore> {
    let store = Arc::new(InMemoryMappingStore::new());
    store
        .upsert_field(field("f-glu", "GLUCOSE", FieldType::Numeric))
        .await
        .expect("field");
    store
        .upsert_field(field("f-hiv", "HIV", FieldType::Qualitative))
        .await
        .expect("field");
    store
        .upsert_mapping(mapping(
            "m-1",
            "f-glu",
            MappingTarget::Test("TEST-001".to_string()),
            true,
        ))
        .await
        .expect("mapping");
    store
        .upsert_mapping(mapping(
            "m-2",
            "f-hiv",
            MappingTarget::Test("TEST-HIV".to_string()),
            false,
        ))
        .await
        .expect("mapping");
    for (id, value, code, is_default) in [
        ("q-1", "POS", "POSITIVE", false),
        ("q-2", "NEG", "NEGATIVE", false),
        ("q-3", "IND", "INDETERMINATE", true),
    ] {
        store
            .upsert_qualitative_mapping(QualitativeMappingRecord {
                mapping_id: id.to_string(),
                analyzer_field_id: "f-hiv".to_string(),
                analyzer_value: value.to_string(),
                canonical_code: code.to_string(),
                is_default,
            })
            .await
            .expect("qualitative");
    }
    store
}

async fn add_unit(store: &InMemoryMappingStore, factor: Option<f64>, reject: bool) {
    store
        .upsert_unit_mapping(UnitMappingRecord {
            mapping_id: "u-1".to_string(),
            analyzer_field_id: "f-glu".to_string(),
            analyzer_unit: "mg/dL".to_string(),
            canonical_unit: "mmol/L".to_string(),
            conversion_factor: factor,
            reject_if_mismatch: reject,
        })
        .await
        .expect("unit");
}

async fn load(store: Arc<InMemoryMappingStore>) -> MappingContext {
    StorageMappingProvider::new(store)
        .load_context(ANALYZER)
        .await
        .expect("context")
}

#[test]
fn no_active_mappings_is_a_noop() {
    let message = glucose_message("100", "mg/dL");
    let outcome = MappingContext::empty(ANALYZER).apply(MessageLayout::Astm, &message);
    assert!(outcome.success);
    assert!(!outcome.has_mappings);
    assert_eq!(outcome.transformed_lines, message);
    assert!(outcome.unmapped_fields.is_empty());
}

#[tokio::test]
async fn rewrites_codes_values_and_units() {
    let store = seeded_store().await;
    add_unit(&store, Some(0.0555), false).await;
    let context = load(store).await;

    let outcome = context.apply(MessageLayout::Astm, &glucose_message("100", "mg/dL"));
    assert!(outcome.success, "{:?}", outcome.errors);
    assert_eq!(
        outcome.transformed_lines[3],
        "R|1|^^^TEST-001|5.55|mmol/L||N||F||||20240115103000"
    );
    assert_eq!(
        outcome.transformed_lines[4],
        "R|2|^^^TEST-HIV|POSITIVE|||N||F||||20240115103000"
    );
    assert_eq!(outcome.applied.len(), 2);
    assert!(outcome.unmapped_fields.is_empty());
}

#[tokio::test]
async fn rewrites_obx_code_value_and_unit() {
    let store = seeded_store().await;
    add_unit(&store, Some(0.0555), false).await;
    let context = load(store).await;

    let message = lines(&[
        "MSH|^~\\&|ACME|LAB|LIS|LAB|20240115103000||ORU^R01|MSG-1|P|2.5.1",
        "PID|1||P-100",
        "OBR|1||S-001|CHEM",
        "OBX|1|NM|GLUCOSE^Glucose||100|mg/dL^^UCUM|||||F",
        "OBX|2|ST|HIV^HIV screen||pos||||||F",
    ]);
    let outcome = context.apply(MessageLayout::Hl7, &message);
    assert!(outcome.success, "{:?}", outcome.errors);
    assert_eq!(
        outcome.transformed_lines[3],
        "OBX|1|NM|TEST-001^Glucose||5.55|mmol/L^^UCUM|||||F"
    );
    assert_eq!(
        outcome.transformed_lines[4],
        "OBX|2|ST|TEST-HIV^HIV screen||POSITIVE||||||F"
    );
    assert_eq!(outcome.transformed_lines[..3], message[..3]);
    assert!(outcome.unmapped_fields.is_empty());
}

#[tokio::test]
async fn unknown_qualitative_value_uses_default() {
    let context = load(seeded_store().await).await;
    let mut message = glucose_message("100", "mg/dL");
    message[4] = "R|2|^^^HIV|weird|||N||F||||20240115103000".to_string();
    let outcome = context.apply(MessageLayout::Astm, &message);
    assert!(outcome.success);
    assert!(outcome.transformed_lines[4].contains("|INDETERMINATE|"));
}

#[tokio::test]
async fn unit_mismatch_with_reject_fails_message() {
    let store = seeded_store().await;
    add_unit(&store, None, true).await;
    let context = load(store).await;

    let outcome = context.apply(MessageLayout::Astm, &glucose_message("100", "mg/dL"));
    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.error_type(), ErrorType::Mapping);
}

#[tokio::test]
async fn missing_required_field_fails_and_unknown_codes_are_unmapped() {
    let context = load(seeded_store().await).await;
    let message = lines(&[
        "H|\\^&|||ACME^X100",
        "O|1|S-001",
        "R|1|^^^CHOL|180|mg/dL",
        "L|1|N",
    ]);
    let outcome = context.apply(MessageLayout::Astm, &message);
    assert!(!outcome.success);
    assert_eq!(outcome.unmapped_fields, vec!["CHOL".to_string()]);
    assert!(outcome.errors[0].contains("GLUCOSE"));
}

#[tokio::test]
async fn specimen_constraint_mismatch_skips_mapping() {
    let store = seeded_store().await;
    let mut constrained = mapping(
        "m-1",
        "f-glu",
        MappingTarget::Test("TEST-001".to_string()),
        true,
    );
    constrained.specimen_type_constraint = Some("URINE".to_string());
    store.upsert_mapping(constrained).await.expect("mapping");
    let context = load(store).await;

    let outcome = context.apply(MessageLayout::Astm, &glucose_message("100", "mg/dL"));
    assert!(outcome.success);
    assert!(outcome.unmapped_fields.contains(&"GLUCOSE".to_string()));
    assert!(outcome.warnings.iter().any(|warning| warning.contains("URINE")));
    assert!(outcome.transformed_lines[3].contains("^^^GLUCOSE|100|mg/dL"));
}

#[tokio::test]
async fn mapping_aware_strategy_records_errors_and_blocks_insert() {
    let store = seeded_store().await;
    add_unit(&store, None, true).await;
    let context = Arc::new(load(store).await);
    let results = Arc::new(InMemoryResultStore::new());
    let recorder = Arc::new(CollectingRecorder::default());
    let plugin_inserter: Arc<dyn LineInserter> =
        Arc::new(ResultStoreInserter::new(results.clone(), MessageLayout::Astm));
    let message = glucose_message("100", "mg/dL");
    let raw = message.join("\r");

    let strategy = InserterStrategy::select(
        plugin_inserter,
        Some(context),
        MessageLayout::Astm,
        recorder.clone(),
        &raw,
    );
    assert!(strategy.is_mapping_aware());

    let insert_context = InsertContext {
        analyzer_id: Some(ANALYZER.to_string()),
        user_id: "SYSTEM".to_string(),
        received_at_ms: 1_000,
    };
    let err = strategy
        .insert(&insert_context, &message)
        .await
        .expect_err("rejected");
    match &err {
        InsertError::Rejected { error_id, .. } => assert_eq!(error_id.as_deref(), Some("error-1")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(results.is_empty());

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::Mapping);
    assert_eq!(errors[0].severity, Severity::Error);
    assert_eq!(errors[0].raw_message, raw);
}

#[tokio::test]
async fn unmapped_fields_are_warned_and_still_inserted() {
    let context = Arc::new(load(seeded_store().await).await);
    let results = Arc::new(InMemoryResultStore::new());
    let recorder = Arc::new(CollectingRecorder::default());
    let plugin_inserter: Arc<dyn LineInserter> =
        Arc::new(ResultStoreInserter::new(results.clone(), MessageLayout::Astm));
    let mut message = glucose_message("5.5", "mmol/L");
    message.insert(5, "R|3|^^^CHOL|180|mg/dL||N||F||||20240115103000".to_string());

    let strategy = InserterStrategy::select(
        plugin_inserter,
        Some(context),
        MessageLayout::Astm,
        recorder.clone(),
        &message.join("\r"),
    );
    let outcome = strategy
        .insert(
            &InsertContext {
                analyzer_id: Some(ANALYZER.to_string()),
                user_id: "SYSTEM".to_string(),
                received_at_ms: 1_000,
            },
            &message,
        )
        .await
        .expect("insert");
    assert_eq!(outcome.insert.inserted, 3);
    assert_eq!(outcome.warning_error_id.as_deref(), Some("error-1"));

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Warning);
    assert!(errors[0].message.contains("CHOL"));

    let saved = results.list_results(Some(ANALYZER)).await.expect("results");
    assert!(saved.iter().any(|result| result.test_code == "TEST-001"));
    assert!(saved.iter().any(|result| result.test_code == "CHOL"));
}

#[tokio::test]
async fn strategy_is_plain_without_mappings() {
    let results = Arc::new(InMemoryResultStore::new());
    let plugin_inserter: Arc<dyn LineInserter> =
        Arc::new(ResultStoreInserter::new(results, MessageLayout::Astm));
    let strategy = InserterStrategy::select(
        plugin_inserter,
        Some(Arc::new(MappingContext::empty(ANALYZER))),
        MessageLayout::Astm,
        Arc::new(CollectingRecorder::default()),
        "",
    );
    assert!(!strategy.is_mapping_aware());
}

#[tokio::test]
async fn qc_segments_use_test_and_lot_mappings() {
    let store = seeded_store().await;
    store
        .upsert_field(field("f-lot", "LOT42", FieldType::ControlTest))
        .await
        .expect("field");
    store
        .upsert_mapping(mapping(
            "m-3",
            "f-lot",
            MappingTarget::Qc("CONTROL-LOT-42".to_string()),
            false,
        ))
        .await
        .expect("mapping");
    add_unit(&store, Some(0.0555), false).await;
    let context = load(store).await;

    let results = Arc::new(InMemoryResultStore::new());
    let recorder = Arc::new(CollectingRecorder::default());
    let processor = QcProcessor::new(Some(results.clone()), recorder.clone());
    let message = lines(&[
        "H|\\^&|||ACME^X100^1.0",
        "Q|1|GLUCOSE^LOT42^N|100|mg/dL|20240115103000",
        "Q|2|GLUCOSE^LOT99^H|300|mg/dL|20240115103000",
        "L|1|N",
    ]);

    let report = processor
        .process(ANALYZER, &context, &message, "raw", 1_000)
        .await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.failures, 1);

    let saved = results.list_qc_results(ANALYZER).await.expect("qc");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].test_id, "TEST-001");
    assert_eq!(saved[0].control_lot_id, "CONTROL-LOT-42");
    assert_eq!(saved[0].unit, "mmol/L");
    assert!((saved[0].value - 5.55).abs() < 1e-9);
    assert_eq!(saved[0].instrument_id.as_deref(), Some("ACME"));

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::QcMappingIncomplete);
}

#[tokio::test]
async fn qc_without_store_reports_service_unavailable() {
    let recorder = Arc::new(CollectingRecorder::default());
    let processor = QcProcessor::new(None, recorder.clone());
    let message = lines(&[
        "H|\\^&|||ACME^X100",
        "Q|1|GLUCOSE^LOT42^N|100|mg/dL|20240115103000",
    ]);
    let report = processor
        .process(ANALYZER, &MappingContext::empty(ANALYZER), &message, "raw", 1_000)
        .await;
    assert_eq!(report.failures, 1);
    assert_eq!(recorder.errors()[0].error_type, ErrorType::QcServiceUnavailable);
}

#[tokio::test]
async fn preview_is_bounded_and_shows_entities() {
    assert!(ensure_preview_size("short", 10).is_ok());
    assert!(matches!(
        ensure_preview_size("this message is too long", 10),
        Err(MappingError::PreviewTooLarge { max: 10, .. })
    ));

    let context = load(seeded_store().await).await;
    let result = preview(&context, MessageLayout::Astm, &glucose_message("100", "mg/dL"));
    assert_eq!(result.parsed_fields.len(), 2);
    assert_eq!(result.entities[0].code, "TEST-001");
    assert_eq!(result.entities[1].value, "POSITIVE");
}
