//! HTTP handlers
//! /api/analyze, /api/analyses, /api/discover, UI ページ

pub mod analyze;
pub mod discover;
pub mod illustrations;
pub mod ui;

use axum::{http::StatusCode, response::Json};
use serde::Serialize;

use crate::services::ServiceError;

// ========================================
// エラーレスポンス
// ========================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message,
        }),
    )
}

/// サービス層のエラー → HTTP
///
/// パース失敗は `parse_message` をそのまま見せる。上流のエラーは 502。
pub fn service_error(err: &ServiceError, parse_message: &str) -> (StatusCode, Json<ErrorResponse>) {
    if err.is_parse_failure() {
        error_response(StatusCode::BAD_GATEWAY, parse_message.to_string())
    } else {
        error_response(StatusCode::BAD_GATEWAY, err.to_string())
    }
}
