//! Discovery API Handlers
//! /api/discover エンドポイント - カタログ閲覧（無限スクロール）

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{error_response, service_error, ErrorResponse};
use crate::models::{DiscoverItem, DiscoverTopic};
use crate::services::discovery::get_discovery_data;
use crate::AppState;

const DISCOVERY_FAILED_MESSAGE: &str = "We encountered a temporary bottleneck. Try again.";

// ========================================
// Response Types
// ========================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    pub success: bool,
    pub topic: DiscoverTopic,
    pub query: String,
    pub page: u32,
    pub items: Vec<DiscoverItem>,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u32>,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchResponse {
    pub success: bool,
    pub topic: DiscoverTopic,
    pub cached: bool,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub cleared: usize,
}

// ========================================
// Query Parameters
// ========================================

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub topic: DiscoverTopic,
    #[serde(default)]
    pub q: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

#[derive(Debug, Deserialize)]
pub struct PrefetchQuery {
    pub topic: DiscoverTopic,
}

fn first_page() -> u32 {
    1
}

// ========================================
// Handlers
// ========================================

/// GET /api/discover?topic=sets&q=castle&page=1 - カタログ1ページ分
pub async fn discover(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> Result<Json<DiscoverResponse>, (StatusCode, Json<ErrorResponse>)> {
    if query.page == 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "page starts at 1".to_string(),
        ));
    }

    let page = get_discovery_data(
        state.model.as_ref(),
        &state.config.discovery_model,
        &state.discovery_cache,
        query.topic,
        &query.q,
        query.page,
    )
    .await
    .map_err(|e| {
        warn!("❌ Discovery failed: {}", e);
        service_error(&e, DISCOVERY_FAILED_MESSAGE)
    })?;

    // u32::MAX の次はない
    let next_page = query.page.checked_add(1).filter(|_| page.has_next_page());
    Ok(Json(DiscoverResponse {
        success: true,
        topic: query.topic,
        query: query.q,
        page: query.page,
        items: page.items.to_vec(),
        has_next_page: next_page.is_some(),
        next_page,
        cached: page.cached,
    }))
}

/// POST /api/discover/prefetch?topic=pieces - タブのホバー時に1ページ目を温める
pub async fn prefetch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PrefetchQuery>,
) -> Result<Json<PrefetchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let page = get_discovery_data(
        state.model.as_ref(),
        &state.config.discovery_model,
        &state.discovery_cache,
        query.topic,
        "",
        1,
    )
    .await
    .map_err(|e| service_error(&e, DISCOVERY_FAILED_MESSAGE))?;

    Ok(Json(PrefetchResponse {
        success: true,
        topic: query.topic,
        cached: page.cached,
        total: page.items.len(),
    }))
}

/// DELETE /api/discover/cache - キャッシュ全削除
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearCacheResponse> {
    let cleared = state.discovery_cache.clear();
    info!("🗑️  Discovery cache cleared: {} entries", cleared);

    Json(ClearCacheResponse {
        success: true,
        cleared,
    })
}
