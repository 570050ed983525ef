use super::*;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use lis_storage::AnalyzerStore;
use serde_json::{Value, json};
use tower::ServiceExt;

const GLUCOSE: &str = "H|\\^&|||ACME^X100^1.0|||||||P|1\rP|1\rO|1|S-001||^^^GLUCOSE\rR|1|^^^GLUCOSE|5.4|mmol/L||N||F||||20240115103000\rL|1|N\r";

async fn app() -> Router {
    let stores = in_memory_stores();
    let file = seed::parse_seed(include_str!("../seed/demo.json")).expect("seed");
    seed::apply_seed(&file, &stores).await.expect("apply seed");
    let types = stores.analyzers.list_analyzer_types().await.expect("types");
    let registry = PluginRegistry::from_analyzer_types(&types, stores.results.clone());
    let processor = Arc::new(MessageProcessor::new(Arc::new(registry), stores.clone()));
    build_app(AppState {
        processor,
        stores,
        storage: "memory",
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    read(app.clone().oneshot(request).await.expect("response")).await
}

async fn send_text(app: &Router, uri: &str, text: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(text.to_string()))
        .expect("request");
    read(app.clone().oneshot(request).await.expect("response")).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

#[tokio::test]
async fn health_reports_storage_and_request_ids() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-trace-id"));
    let (_, body) = read(response).await;
    assert_eq!(body["data"]["storage"], "memory");

    let (status, body) = send(&app, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["messagesReceived"].is_u64());
}

#[tokio::test]
async fn astm_message_is_mapped_and_inserted() {
    let app = app().await;
    let (status, body) = send_text(&app, "/messages/astm", GLUCOSE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "INSERTED");
    assert_eq!(body["data"]["analyzerId"], "analyzer-acme");
    assert_eq!(body["data"]["pluginName"], "GenericASTM");
    assert_eq!(body["data"]["inserted"], 1);
}

#[tokio::test]
async fn unmatched_message_is_rejected_and_acknowledged() {
    let app = app().await;
    let text = "H|\\^&|||UNKNOWN^Z1^1.0\rL|1|N\r";
    let (status, body) = send_text(&app, "/messages/astm", text).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "PLUGIN.NO_MATCH");
    let error_id = body["error"]["errorId"]
        .as_str()
        .expect("error id")
        .to_string();

    let (status, body) = send(&app, Method::GET, &format!("/analyzer-errors/{error_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["errorType"], "PROTOCOL");
    assert!(
        body["data"]["rawMessage"]
            .as_str()
            .is_some_and(|raw| raw.contains("UNKNOWN^Z1"))
    );

    let uri = format!("/analyzer-errors/{error_id}/acknowledge");
    let (status, _) = send(&app, Method::POST, &uri, Some(json!({ "userId": " " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "userId": "U1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ACKNOWLEDGED");
    assert_eq!(body["data"]["acknowledgedBy"], "U1");

    let (status, body) = send(
        &app,
        Method::GET,
        "/analyzer-errors?status=ACKNOWLEDGED&errorType=PROTOCOL",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(&app, Method::GET, "/analyzer-errors/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalErrors"], 1);
    assert_eq!(body["data"]["unacknowledged"], 0);

    let (status, _) = send(&app, Method::GET, "/analyzer-errors?severity=LOUD", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_acknowledge_reports_unknown_ids() {
    let app = app().await;
    let (_, body) = send_text(&app, "/messages/hl7", "").await;
    let error_id = body["error"]["errorId"]
        .as_str()
        .expect("error id")
        .to_string();
    let (status, body) = send(
        &app,
        Method::POST,
        "/analyzer-errors/batch-acknowledge",
        Some(json!({ "errorIds": [error_id.clone(), "missing"], "userId": "U2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], json!([error_id]));
    assert_eq!(body["data"]["notFound"], json!(["missing"]));

    let uri = format!("/analyzer-errors/{error_id}/resolve");
    let (status, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "RESOLVED");
    assert_eq!(body["data"]["acknowledgedBy"], "U2");
}

#[tokio::test]
async fn unknown_ids_return_not_found() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/analyzers/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RESOURCE.NOT_FOUND");
    let (status, _) = send(&app, Method::GET, "/analyzer-errors/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, "/analyzer-errors/missing/reprocess", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_text(&app, "/analyzers/missing/files", "a,b\n1,2\n").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/analyzers/missing/mappings/coverage", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_events_follow_transition_table() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/analyzers/analyzer-acme/status-events",
        Some(json!({ "event": "CONNECTION_TEST_FAILED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["previousStatus"], "ACTIVE");
    assert_eq!(body["data"]["status"], "OFFLINE");
    assert_eq!(body["data"]["changed"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        "/analyzers/analyzer-bench/status-events",
        Some(json!({ "targetStatus": "ACTIVE" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ANALYZER.ILLEGAL_TRANSITION");

    let (status, _) = send(
        &app,
        Method::POST,
        "/analyzers/analyzer-bench/status-events",
        Some(json!({ "event": "MAPPING_CREATED", "targetStatus": "VALIDATION" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::GET, "/analyzers/analyzer-acme", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "OFFLINE");
}

#[tokio::test]
async fn preview_and_coverage_use_configured_mappings() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/analyzers/analyzer-acme/mappings/preview",
        Some(json!({ "message": GLUCOSE })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["parsedFields"][0]["fieldName"], "GLUCOSE");
    assert_eq!(body["data"]["appliedMappings"][0]["targetId"], "TEST-GLU");
    assert_eq!(body["data"]["errors"], json!([]));

    let oversized = "R".repeat(lis_pipeline::DEFAULT_PREVIEW_MAX_BYTES + 1);
    let (status, body) = send(
        &app,
        Method::POST,
        "/analyzers/analyzer-acme/mappings/preview",
        Some(json!({ "message": oversized })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PREVIEW.TOO_LARGE");

    let (status, body) = send(
        &app,
        Method::GET,
        "/analyzers/analyzer-acme/mappings/coverage",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalFields"], 2);
    assert_eq!(body["data"]["mappedFields"], 2);
    assert_eq!(body["data"]["requiredMappings"], 1);
}

#[tokio::test]
async fn file_upload_uses_column_mappings() {
    let app = app().await;
    let (status, body) = send_text(
        &app,
        "/analyzers/analyzer-reader/files",
        "SampleID,Assay,OD,Well\nS-1,ELISA,0.42,A1\n",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "INSERTED");
    assert_eq!(body["data"]["analyzerId"], "analyzer-reader");
    assert_eq!(body["data"]["inserted"], 1);

    let (status, body) = send(&app, Method::GET, "/analyzers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
}
