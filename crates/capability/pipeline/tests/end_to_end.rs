use domain::{
    AnalyzerStatus, ErrorStatus, ErrorType, FieldType, InboundMessage, MappingTarget, MappingType,
    Severity, Transport,
};
use lis_normalize::NewAnalyzerError;
use lis_pipeline::{MessageProcessor, PipelineStores, ProcessError, ProcessStatus};
use lis_plugin::PluginRegistry;
use lis_storage::{
    AnalyzerErrorStore, AnalyzerFieldRecord, AnalyzerRecord, AnalyzerStore, AnalyzerTypeRecord,
    ColumnMapping, ErrorFilter, FieldMappingRecord, FileImportConfigRecord,
    InMemoryAnalyzerErrorStore, InMemoryAnalyzerStore, InMemoryMappingStore, InMemoryResultStore,
    InMemoryTransportConfigStore, MappingStore, ResultStore, TransportConfigStore,
    UnitMappingRecord,
};
use std::sync::Arc;

const ANALYZER: &str = "analyzer-acme";

struct Harness {
    processor: MessageProcessor,
    analyzers: Arc<InMemoryAnalyzerStore>,
    mappings: Arc<InMemoryMappingStore>,
    errors: Arc<InMemoryAnalyzerErrorStore>,
    results: Arc<InMemoryResultStore>,
    transport_configs: Arc<InMemoryTransportConfigStore>,
}

fn analyzer_type(type_id: &str, plugin_name: &str, pattern: Option<&str>, sort_order: i32) -> AnalyzerTypeRecord {
    AnalyzerTypeRecord {
        type_id: type_id.to_string(),
        name: type_id.to_uppercase(),
        protocol: plugin_name.to_string(),
        plugin_name: plugin_name.to_string(),
        identifier_pattern: pattern.map(str::to_string),
        generic_plugin: true,
        active: true,
        sort_order,
    }
}

async fn harness(register_plugins: bool) -> Harness {
    let analyzers = Arc::new(InMemoryAnalyzerStore::new());
    let mappings = Arc::new(InMemoryMappingStore::new());
    let errors = Arc::new(InMemoryAnalyzerErrorStore::new());
    let results = Arc::new(InMemoryResultStore::new());
    let transport_configs = Arc::new(InMemoryTransportConfigStore::new());

    let types = vec![
        analyzer_type("type-acme", "GenericASTM", Some("^ACME"), 1),
        analyzer_type("type-file", "GenericFile", None, 2),
        analyzer_type("type-acme-hl7", "GenericHL7", Some("^ACME"), 3),
    ];
    for item in &types {
        analyzers
            .upsert_analyzer_type(item.clone())
            .await
            .expect("type");
    }
    let registry = if register_plugins {
        PluginRegistry::from_analyzer_types(&types, results.clone())
    } else {
        PluginRegistry::new()
    };

    let mut analyzer = AnalyzerRecord::new(ANALYZER, "ACME X100");
    analyzer.analyzer_type_id = Some("type-acme".to_string());
    analyzer.status = AnalyzerStatus::Active;
    analyzers.upsert_analyzer(analyzer).await.expect("analyzer");

    mappings
        .upsert_field(AnalyzerFieldRecord {
            field_id: "f-glu".to_string(),
            analyzer_id: ANALYZER.to_string(),
            field_name: "GLUCOSE".to_string(),
            astm_ref: None,
            field_type: FieldType::Numeric,
            unit: Some("mmol/L".to_string()),
            custom_field_type_id: None,
            active: true,
        })
        .await
        .expect("field");
    mappings
        .upsert_mapping(glucose_mapping(true))
        .await
        .expect("mapping");

    let stores = PipelineStores {
        analyzers: analyzers.clone(),
        mappings: mappings.clone(),
        errors: errors.clone(),
        results: results.clone(),
        transport_configs: transport_configs.clone(),
    };
    Harness {
        processor: MessageProcessor::new(Arc::new(registry), stores),
        analyzers,
        mappings,
        errors,
        results,
        transport_configs,
    }
}

fn glucose_mapping(active: bool) -> FieldMappingRecord {
    FieldMappingRecord {
        mapping_id: "m-glu".to_string(),
        analyzer_id: ANALYZER.to_string(),
        analyzer_field_id: "f-glu".to_string(),
        target: MappingTarget::Test("TEST-001".to_string()),
        mapping_type: MappingType::TestLevel,
        required: true,
        active,
        specimen_type_constraint: None,
        panel_constraint: None,
        version: 1,
    }
}

fn glucose_message(unit: &str) -> InboundMessage {
    let text = format!(
        "H|\\^&|||ACME^X100^1.0|||||||P|1\rP|1\rO|1|S-001||^^^GLUCOSE\rR|1|^^^GLUCOSE|95|{unit}||N||F||||20240115103000\rL|1|N\r"
    );
    InboundMessage::new(Transport::Astm, text.into_bytes(), 1_000)
}

async fn reject_milligrams(mappings: &InMemoryMappingStore, reject: bool) {
    mappings
        .upsert_unit_mapping(UnitMappingRecord {
            mapping_id: "u-glu".to_string(),
            analyzer_field_id: "f-glu".to_string(),
            analyzer_unit: "mg/dL".to_string(),
            canonical_unit: "mmol/L".to_string(),
            conversion_factor: (!reject).then_some(0.0555),
            reject_if_mismatch: reject,
        })
        .await
        .expect("unit");
}

async fn all_errors(store: &InMemoryAnalyzerErrorStore) -> Vec<lis_storage::AnalyzerErrorRecord> {
    store
        .list_errors(&ErrorFilter::default())
        .await
        .expect("errors")
}

#[tokio::test]
async fn unmatched_astm_message_is_reported_and_not_persisted() {
    let harness = harness(false).await;
    let err = harness
        .processor
        .process(glucose_message("mmol/L"))
        .await
        .expect_err("no plugin");

    match &err {
        ProcessError::NoPluginMatched { message, error_id } => {
            assert!(message.starts_with("No ASTM plugin matched this message"));
            assert!(error_id.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.results.is_empty());
    let errors = all_errors(&harness.errors).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::Protocol);
}

#[tokio::test]
async fn active_mapping_rewrites_code_before_insert() {
    let harness = harness(true).await;
    let outcome = harness
        .processor
        .process(glucose_message("mmol/L"))
        .await
        .expect("processed");

    assert_eq!(outcome.status, ProcessStatus::Inserted);
    assert_eq!(outcome.analyzer_id.as_deref(), Some(ANALYZER));
    assert!(outcome.mapping_applied);
    assert_eq!(outcome.inserted, 1);

    let stored = harness
        .results
        .list_results(Some(ANALYZER))
        .await
        .expect("results");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].test_code, "TEST-001");
    assert_eq!(stored[0].sample_id, "S-001");
    assert!(all_errors(&harness.errors).await.is_empty());
}

#[tokio::test]
async fn rejected_unit_records_mapping_error_and_persists_nothing() {
    let harness = harness(true).await;
    reject_milligrams(&harness.mappings, true).await;

    let err = harness
        .processor
        .process(glucose_message("mg/dL"))
        .await
        .expect_err("rejected");
    assert!(matches!(err, ProcessError::MappingRejected { .. }));
    assert!(harness.results.is_empty());

    let errors = all_errors(&harness.errors).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(err.error_id(), Some(errors[0].error_id.as_str()));
    assert_eq!(errors[0].error_type, ErrorType::Mapping);
    assert_eq!(errors[0].severity, Severity::Error);
    assert_eq!(errors[0].analyzer_id.as_deref(), Some(ANALYZER));
    assert!(errors[0].raw_message.contains("R|1|^^^GLUCOSE|95|mg/dL"));

    let analyzer = harness
        .analyzers
        .find_analyzer(ANALYZER)
        .await
        .expect("find")
        .expect("analyzer");
    assert_eq!(analyzer.status, AnalyzerStatus::ErrorPending);
}

#[tokio::test]
async fn reprocess_fails_while_mapping_is_incomplete_then_resolves() {
    let harness = harness(true).await;
    reject_milligrams(&harness.mappings, true).await;
    harness
        .processor
        .process(glucose_message("mg/dL"))
        .await
        .expect_err("rejected");
    let error_id = all_errors(&harness.errors).await[0].error_id.clone();

    let err = harness
        .processor
        .reprocess(&error_id)
        .await
        .expect_err("still incomplete");
    assert!(matches!(err, ProcessError::Reprocess(_)));
    let errors = all_errors(&harness.errors).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].status, ErrorStatus::Unacknowledged);
    assert!(harness.results.is_empty());

    reject_milligrams(&harness.mappings, false).await;
    let reprocessed = harness
        .processor
        .reprocess(&error_id)
        .await
        .expect("reprocessed");
    assert_eq!(reprocessed.status, ErrorStatus::Resolved);
    assert_eq!(reprocessed.outcome.inserted, 1);

    let stored = harness
        .results
        .list_results(Some(ANALYZER))
        .await
        .expect("results");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].test_code, "TEST-001");
    let resolved = harness
        .processor
        .errors()
        .get(&error_id)
        .await
        .expect("error");
    assert!(resolved.resolved_at_ms.is_some());
}

#[tokio::test]
async fn reprocess_keeps_warning_open_while_fields_are_unmapped() {
    let harness = harness(true).await;
    let text = "H|\\^&|||ACME^X100^1.0|||||||P|1\rP|1\rO|1|S-001||^^^GLUCOSE\rR|1|^^^GLUCOSE|5.4|mmol/L||N||F||||20240115103000\rR|2|^^^SODIUM|140|mmol/L||N||F||||20240115103000\rL|1|N\r";
    let outcome = harness
        .processor
        .process(InboundMessage::new(Transport::Astm, text.as_bytes().to_vec(), 1_000))
        .await
        .expect("processed");
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.unmapped_fields, vec!["SODIUM".to_string()]);
    let warning_id = outcome.warning_error_id.expect("warning recorded");

    let err = harness
        .processor
        .reprocess(&warning_id)
        .await
        .expect_err("still unmapped");
    assert!(matches!(err, ProcessError::Reprocess(_)));
    assert!(err.to_string().contains("SODIUM"));

    let warning = harness
        .processor
        .errors()
        .get(&warning_id)
        .await
        .expect("warning");
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.status, ErrorStatus::Unacknowledged);
    assert_eq!(harness.results.len(), 2);
    assert_eq!(all_errors(&harness.errors).await.len(), 1);
}

#[tokio::test]
async fn reprocess_requires_identified_analyzer_with_active_mappings() {
    let harness = harness(true).await;
    harness
        .processor
        .process(InboundMessage::new(Transport::Hl7, Vec::new(), 1_000))
        .await
        .expect_err("empty");
    let unidentified = all_errors(&harness.errors).await[0].error_id.clone();
    let err = harness
        .processor
        .reprocess(&unidentified)
        .await
        .expect_err("no analyzer");
    assert!(matches!(err, ProcessError::Reprocess(_)));

    harness
        .mappings
        .upsert_mapping(glucose_mapping(false))
        .await
        .expect("mapping");
    let raw = String::from_utf8(glucose_message("mmol/L").payload).expect("utf8");
    let unmapped = harness
        .processor
        .errors()
        .create(NewAnalyzerError::new(
            Some(ANALYZER),
            ErrorType::Mapping,
            Severity::Error,
            "Mapping failed: required field GLUCOSE is missing",
            raw,
        ))
        .await
        .expect("error");
    let err = harness
        .processor
        .reprocess(&unmapped.error_id)
        .await
        .expect_err("no active mappings");
    assert!(matches!(err, ProcessError::Reprocess(_)));
    assert!(err.to_string().contains("no active mappings"));

    let stored = harness
        .processor
        .errors()
        .get(&unmapped.error_id)
        .await
        .expect("error");
    assert_eq!(stored.status, ErrorStatus::Unacknowledged);
    assert!(harness.results.is_empty());
}

#[tokio::test]
async fn hl7_result_is_mapped_converted_and_acknowledged() {
    let harness = harness(true).await;
    reject_milligrams(&harness.mappings, false).await;
    let text = "MSH|^~\\&|ACME X100|CORE|LIS|LAB|20240115103000||ORU^R01|MSG-7|P|2.5.1\r\
PID|1||P-100\r\
OBR|1||S-001|CHEM\r\
OBX|1|NM|GLUCOSE^Glucose||100|mg/dL|||||F|||20240115102000\r";
    let outcome = harness
        .processor
        .process(InboundMessage::new(Transport::Hl7, text.as_bytes().to_vec(), 1_000))
        .await
        .expect("processed");
    assert_eq!(outcome.status, ProcessStatus::Inserted);
    assert_eq!(outcome.plugin, "GenericHL7");
    assert_eq!(outcome.analyzer_id.as_deref(), Some(ANALYZER));
    assert!(outcome.mapping_applied);
    let ack = outcome.response.expect("ack");
    assert_eq!(ack[1], "MSA|AA|MSG-7");

    let stored = harness
        .results
        .list_results(Some(ANALYZER))
        .await
        .expect("results");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].test_code, "TEST-001");
    assert_eq!(stored[0].value, "5.55");
    assert_eq!(stored[0].units.as_deref(), Some("mmol/L"));
    assert_eq!(stored[0].sample_id, "S-001");
    assert!(stored[0].raw_line.starts_with("OBX|1|NM|TEST-001^Glucose||5.55|mmol/L|"));
    assert!(all_errors(&harness.errors).await.is_empty());
}

#[tokio::test]
async fn reprocess_unknown_error_is_not_found() {
    let harness = harness(true).await;
    let err = harness
        .processor
        .reprocess("missing")
        .await
        .expect_err("missing");
    assert!(matches!(err, ProcessError::NotFound(_)));
}

#[tokio::test]
async fn acknowledge_records_user_and_time() {
    let harness = harness(false).await;
    harness
        .processor
        .process(glucose_message("mmol/L"))
        .await
        .expect_err("no plugin");
    let error_id = all_errors(&harness.errors).await[0].error_id.clone();

    let acked = harness
        .processor
        .errors()
        .acknowledge(&error_id, "U1")
        .await
        .expect("acknowledged");
    assert_eq!(acked.status, ErrorStatus::Acknowledged);
    assert_eq!(acked.acknowledged_by.as_deref(), Some("U1"));
    assert!(acked.acknowledged_at_ms.is_some());
    assert!(acked.resolved_at_ms.is_none());
}

#[tokio::test]
async fn query_message_gets_response_without_insert() {
    let harness = harness(true).await;
    let text = "H|\\^&|||ACME^X100^1.0\rQ|1|^S-001||ALL\rL|1|N\r";
    let outcome = harness
        .processor
        .process(InboundMessage::new(Transport::Astm, text.as_bytes().to_vec(), 1_000))
        .await
        .expect("processed");
    assert_eq!(outcome.status, ProcessStatus::Responded);
    assert!(outcome.response.is_some_and(|lines| !lines.is_empty()));
    assert!(harness.results.is_empty());
}

#[tokio::test]
async fn inactive_analyzer_is_not_processed() {
    let harness = harness(true).await;
    harness
        .analyzers
        .update_analyzer_status(ANALYZER, AnalyzerStatus::Inactive, None)
        .await
        .expect("status");
    let err = harness
        .processor
        .process(glucose_message("mmol/L"))
        .await
        .expect_err("inactive");
    assert!(matches!(err, ProcessError::AnalyzerInactive { .. }));
    assert!(harness.results.is_empty());
}

#[tokio::test]
async fn file_import_uses_configured_columns_and_type_plugin() {
    let harness = harness(true).await;
    let mut analyzer = AnalyzerRecord::new("analyzer-file", "Plate Reader");
    analyzer.analyzer_type_id = Some("type-file".to_string());
    analyzer.status = AnalyzerStatus::Active;
    harness
        .analyzers
        .upsert_analyzer(analyzer)
        .await
        .expect("analyzer");
    let mut config = FileImportConfigRecord::new("cfg-1", "analyzer-file", "/var/lis/import");
    config.column_mappings = vec![
        ColumnMapping {
            column: "Sample".to_string(),
            field: "sampleId".to_string(),
        },
        ColumnMapping {
            column: "Test".to_string(),
            field: "testCode".to_string(),
        },
        ColumnMapping {
            column: "Result".to_string(),
            field: "result".to_string(),
        },
    ];
    harness
        .transport_configs
        .upsert_file_import_config(config)
        .await
        .expect("config");

    let payload = b"Sample,Test,Result\nS-9,GLU,5.5\n".to_vec();
    let message =
        InboundMessage::new(Transport::File, payload, 1_000).with_analyzer_hint("analyzer-file");
    let outcome = harness.processor.process(message).await.expect("processed");
    assert_eq!(outcome.plugin, "GenericFile");
    assert_eq!(outcome.analyzer_id.as_deref(), Some("analyzer-file"));
    assert_eq!(outcome.inserted, 1);

    let stored = harness
        .results
        .list_results(Some("analyzer-file"))
        .await
        .expect("results");
    assert_eq!(stored[0].test_code, "GLU");
    assert_eq!(stored[0].value, "5.5");
}

#[tokio::test]
async fn empty_payload_records_read_failure() {
    let harness = harness(true).await;
    let err = harness
        .processor
        .process(InboundMessage::new(Transport::Hl7, Vec::new(), 1_000))
        .await
        .expect_err("empty");
    assert_eq!(err.to_string(), "Empty HL7 message");
    let errors = all_errors(&harness.errors).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::Protocol);
}
