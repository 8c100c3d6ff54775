//! Illustration API Handlers
//! /api/analyses/:id/builds/:index/illustration エンドポイント

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{error_response, ErrorResponse};
use crate::services::analysis::AnalysisSession;
use crate::services::illustration::{
    generate_build_image, BuildKey, IllustrationOutcome, IllustrationState,
};
use crate::AppState;

// ========================================
// Response Types
// ========================================

#[derive(Debug, Serialize)]
pub struct IllustrationResponse {
    pub success: bool,
    #[serde(flatten)]
    pub state: IllustrationState,
}

// ========================================
// Handlers
// ========================================

/// POST /api/analyses/:id/builds/:index/illustration - イラスト生成（1回だけ）
///
/// Returns:
///   - 200 { status: "succeeded", imageUrl }（生成済みならキャッシュを返す）
///   - 202 { status: "inFlight" }（別リクエストが生成中）
///   - 502 生成失敗（次のリクエストで再試行できる）
pub async fn request_illustration(
    State(state): State<Arc<AppState>>,
    Path((analysis_id, index)): Path<(Uuid, usize)>,
) -> Result<(StatusCode, Json<IllustrationResponse>), (StatusCode, Json<ErrorResponse>)> {
    let session = find_build(&state, analysis_id, index)?;
    let key = BuildKey { analysis_id, index };

    let model = state.model.clone();
    let model_name = state.config.image_model.clone();
    let generate = async move {
        let build = &session.result.suggestions[index];
        info!(
            "🖼️  Generating illustration: {:?} ({} pieces listed)",
            build.title,
            build.required_bricks.len()
        );
        generate_build_image(
            model.as_ref(),
            &model_name,
            &session.source,
            &build.title,
            &build.required_bricks,
        )
        .await
    };

    match state.illustrations.ensure(key, generate).await {
        IllustrationOutcome::Ready(image_url) => Ok((
            StatusCode::OK,
            Json(IllustrationResponse {
                success: true,
                state: IllustrationState::Succeeded { image_url },
            }),
        )),
        IllustrationOutcome::Pending => Ok((
            StatusCode::ACCEPTED,
            Json(IllustrationResponse {
                success: true,
                state: IllustrationState::InFlight,
            }),
        )),
        IllustrationOutcome::Failed(message) => {
            Err(error_response(StatusCode::BAD_GATEWAY, message))
        }
    }
}

/// GET /api/analyses/:id/builds/:index/illustration - 現在の状態
pub async fn get_illustration(
    State(state): State<Arc<AppState>>,
    Path((analysis_id, index)): Path<(Uuid, usize)>,
) -> Result<Json<IllustrationResponse>, (StatusCode, Json<ErrorResponse>)> {
    find_build(&state, analysis_id, index)?;

    Ok(Json(IllustrationResponse {
        success: true,
        state: state.illustrations.state(&BuildKey { analysis_id, index }),
    }))
}

fn find_build(
    state: &AppState,
    analysis_id: Uuid,
    index: usize,
) -> Result<Arc<AnalysisSession>, (StatusCode, Json<ErrorResponse>)> {
    let session = state
        .sessions
        .get(&analysis_id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Analysis not found".to_string()))?;

    if index >= session.result.suggestions.len() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Build {} not found", index),
        ));
    }

    Ok(session)
}
