//! Analysis API Handlers
//! /api/analyze, /api/analyses エンドポイント

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{error_response, service_error, ErrorResponse};
use crate::media::ImagePayload;
use crate::models::VisionAnalysisResult;
use crate::services::analysis::{analyze_into_session, AnalysisSession};
use crate::services::ANALYSIS_FAILED_MESSAGE;
use crate::AppState;

// ========================================
// Request / Response Types
// ========================================

/// JSON でのアップロード（data URL もしくは base64）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis_id: Uuid,
    pub no_bricks_found: bool,
    pub result: VisionAnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    pub created_at_ms: i64,
}

impl AnalysisResponse {
    pub fn from_session(session: &AnalysisSession, include_source: bool) -> Self {
        Self {
            success: true,
            analysis_id: session.id,
            no_bricks_found: session.result.no_bricks_found(),
            result: session.result.clone(),
            source_image: include_source.then(|| session.source.to_data_url()),
            created_at_ms: session.created_at_ms,
        }
    }
}

// ========================================
// Handlers
// ========================================

/// POST /api/analyze - ブロック写真を解析
///
/// Parameters:
///   - multipart/form-data: image（必須）
///   - application/json: { "image": "data:image/jpeg;base64,...", "mimeType"?: "image/jpeg" }
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AnalysisResponse>, (StatusCode, Json<ErrorResponse>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let image = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;
        read_image_field(multipart).await?
    } else {
        let Json(body) = Json::<AnalyzeRequest>::from_request(request, &state)
            .await
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;
        ImagePayload::parse(&body.image, body.mime_type.as_deref())
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?
    };

    info!("📸 Analyze request: {} ({} b64 chars)", image.mime_type, image.data.len());
    run_analysis(&state, image).await
}

/// GET /api/analyses/:id - 解析結果（元画像付き）
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.sessions.get(&id) {
        Some(session) => Ok(Json(AnalysisResponse::from_session(&session, true))),
        None => Err(error_response(StatusCode::NOT_FOUND, "Analysis not found".to_string())),
    }
}

/// POST /api/analyses/:id/regenerate - 同じ写真でアイデアを再生成
pub async fn regenerate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisResponse>, (StatusCode, Json<ErrorResponse>)> {
    let previous = state
        .sessions
        .get(&id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Analysis not found".to_string()))?;

    info!("🔁 Regenerating ideas for {}", id);
    run_analysis(&state, previous.source.clone()).await
}

// ========================================
// Helpers
// ========================================

async fn run_analysis(
    state: &AppState,
    image: ImagePayload,
) -> Result<Json<AnalysisResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session = analyze_into_session(
        state.model.as_ref(),
        &state.config.vision_model,
        &state.sessions,
        image,
    )
    .await
    .map_err(|e| {
        warn!("❌ Analysis failed: {}", e);
        service_error(&e, ANALYSIS_FAILED_MESSAGE)
    })?;

    // 追い出されたセッションのイラスト状態も捨てる
    state
        .illustrations
        .retain_analyses(|analysis_id| state.sessions.contains(analysis_id));

    if session.result.no_bricks_found() {
        info!("🏜️  No bricks detected in {}", session.id);
    }

    Ok(Json(AnalysisResponse::from_session(&session, false)))
}

async fn read_image_field(
    mut multipart: Multipart,
) -> Result<ImagePayload, (StatusCode, Json<ErrorResponse>)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("❌ Field read error: {:?}", e);
        error_response(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name != "image" {
            warn!("⚠️  Unknown field: {}", name);
            continue;
        }

        let declared = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await.map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, format!("Read error: {}", e))
        })?;
        info!("✅ Image bytes read: {} bytes", bytes.len());

        return ImagePayload::from_bytes(&bytes, declared.as_deref())
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()));
    }

    Err(error_response(StatusCode::BAD_REQUEST, "No image field found".to_string()))
}
