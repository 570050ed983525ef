use api_contract::{
    AcknowledgeRequest, BatchAcknowledgeRequest, ErrorListQuery, ErrorStatisticsDto,
    MappingCoverageDto, ProcessResultDto, StatusEventRequest,
};
use serde_json::Value;

#[test]
fn error_statistics_is_camel_case() {
    let dto = ErrorStatisticsDto {
        total_errors: 3,
        unacknowledged: 2,
        critical: 1,
        last_24_hours: 3,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value.get("totalErrors"), Some(&Value::from(3)));
    assert_eq!(value.get("last24Hours"), Some(&Value::from(3)));
    assert!(value.get("total_errors").is_none());
}

#[test]
fn acknowledge_request_accepts_both_cases() {
    let camel: AcknowledgeRequest = serde_json::from_str(r#"{"userId":"U1"}"#).expect("parse");
    assert_eq!(camel.user_id, "U1");
    let snake: AcknowledgeRequest = serde_json::from_str(r#"{"user_id":"U2"}"#).expect("parse");
    assert_eq!(snake.user_id, "U2");
}

#[test]
fn batch_acknowledge_request_parses_ids() {
    let req: BatchAcknowledgeRequest =
        serde_json::from_str(r#"{"errorIds":["e1","e2"],"userId":"U1"}"#).expect("parse");
    assert_eq!(req.error_ids, vec!["e1".to_string(), "e2".to_string()]);
}

#[test]
fn status_event_request_fields_are_optional() {
    let req: StatusEventRequest =
        serde_json::from_str(r#"{"event":"CONNECTION_TEST_FAILED"}"#).expect("parse");
    assert_eq!(req.event.as_deref(), Some("CONNECTION_TEST_FAILED"));
    assert!(req.target_status.is_none());
}

#[test]
fn error_list_query_defaults_to_empty() {
    let query: ErrorListQuery = serde_json::from_str("{}").expect("parse");
    assert!(query.analyzer_id.is_none());
    assert!(query.limit.is_none());
}

#[test]
fn process_result_lists_are_arrays() {
    let dto = ProcessResultDto {
        outcome: "RESPONDED".to_string(),
        analyzer_id: None,
        plugin_name: Some("GenericASTM".to_string()),
        inserted: 0,
        duplicates: 0,
        unmapped_fields: vec![],
        warnings: vec![],
        response: vec!["L|1|N".to_string()],
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert!(matches!(value.get("response"), Some(Value::Array(_))));
    assert!(value.get("pluginName").is_some());
    assert!(value.get("unmappedFields").is_some());
}

#[test]
fn coverage_by_unit_is_camel_case() {
    let dto = MappingCoverageDto {
        analyzer_id: "a1".to_string(),
        total_fields: 0,
        mapped_fields: 0,
        required_mappings: 0,
        accuracy: 0.0,
        unmapped_fields: vec![],
        type_warnings: vec![],
        coverage_by_unit: vec![],
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert!(value.get("coverageByUnit").is_some());
    assert!(value.get("typeWarnings").is_some());
}
