//! 报文提交 handlers
//!
//! 仪器或中间件通过 HTTP 推送原始报文：
//! - POST /messages/astm - ASTM 报文（可选 `?analyzerId=` 指定来源仪器）
//! - POST /messages/hl7 - HL7 v2.x 报文
//! - POST /analyzers/{id}/files - 文件导入内容（按该仪器的列映射解析）
//!
//! 处理成功返回处理结论与应答行；失败返回 422 并带上错误记录 ID。

use super::AnalyzerPath;
use crate::AppState;
use crate::utils::response::{not_found_error, outcome_to_dto, process_error, storage_error};
use api_contract::ApiResponse;
use axum::{
    Json,
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{InboundMessage, Transport};
use lis_ingest::now_epoch_ms;
use lis_storage::AnalyzerStore;
use std::net::SocketAddr;

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuery {
    #[serde(alias = "analyzer_id")]
    analyzer_id: Option<String>,
}

pub async fn submit_astm(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<SubmitQuery>,
    body: Bytes,
) -> Response {
    let message = inbound(Transport::Astm, body, connect_info, query);
    process(&state, message).await
}

pub async fn submit_hl7(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<SubmitQuery>,
    body: Bytes,
) -> Response {
    let message = inbound(Transport::Hl7, body, connect_info, query);
    process(&state, message).await
}

/// 文件导入内容，来源仪器由路径确定
pub async fn submit_file(
    State(state): State<AppState>,
    Path(path): Path<AnalyzerPath>,
    body: Bytes,
) -> Response {
    match state.stores.analyzers.find_analyzer(&path.analyzer_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(format!("analyzer {} not found", path.analyzer_id)),
        Err(err) => return storage_error(err),
    }
    let message = InboundMessage::new(Transport::File, body.to_vec(), now_epoch_ms())
        .with_analyzer_hint(path.analyzer_id);
    process(&state, message).await
}

fn inbound(
    transport: Transport,
    body: Bytes,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    query: SubmitQuery,
) -> InboundMessage {
    let mut message = InboundMessage::new(transport, body.to_vec(), now_epoch_ms());
    if let Some(ConnectInfo(addr)) = connect_info {
        message = message.with_source_address(addr.to_string());
    }
    match query.analyzer_id.filter(|id| !id.trim().is_empty()) {
        Some(analyzer_id) => message.with_analyzer_hint(analyzer_id.trim()),
        None => message,
    }
}

async fn process(state: &AppState, message: InboundMessage) -> Response {
    match state.processor.process(message).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(outcome_to_dto(outcome))),
        )
            .into_response(),
        Err(err) => process_error(err),
    }
}
