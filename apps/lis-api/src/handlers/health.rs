//! 健康检查
//!
//! - GET /health

use crate::AppState;
use api_contract::{ApiResponse, HealthDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn health(State(state): State<AppState>) -> Response {
    let dto = HealthDto {
        status: "ok".to_string(),
        storage: state.storage.to_string(),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
