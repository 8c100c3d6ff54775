mod cache;
mod config;
mod gemini;
mod handlers;
mod media;
mod models;
mod prompts;
mod services;
#[cfg(test)]
mod testing;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::gemini::{GeminiClient, GenerativeModel};
use crate::models::DiscoverTopic;
use crate::services::analysis::SessionStore;
use crate::services::discovery::DiscoveryCache;
use crate::services::illustration::IllustrationTracker;

// ========================================
// 共有状態
// ========================================

pub struct AppState {
    pub config: AppConfig,
    pub model: Arc<dyn GenerativeModel>,
    pub sessions: SessionStore,
    pub illustrations: Arc<IllustrationTracker>,
    pub discovery_cache: DiscoveryCache,
}

impl AppState {
    pub fn new(config: AppConfig, model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            sessions: SessionStore::new(config.session_capacity, None),
            discovery_cache: DiscoveryCache::new(
                config.discovery_cache_capacity,
                config.discovery_cache_ttl,
            ),
            illustrations: Arc::new(IllustrationTracker::new()),
            model,
            config,
        }
    }
}

// ========================================
// ヘルスチェック
// ========================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    topics: [DiscoverTopic; 4],
    sessions: usize,
    cached_pages: usize,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "brickvision-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        topics: DiscoverTopic::ALL,
        sessions: state.sessions.len(),
        cached_pages: state.discovery_cache.len(),
    })
}

// ========================================
// ルーター
// ========================================

fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.config.max_upload_bytes;
    let static_dir = state.config.static_dir.clone();

    let mut app = Router::new()
        .route("/", get(handlers::ui::index_page))
        .route("/api/health", get(health_check))
        .route("/api/analyze", post(handlers::analyze::analyze))
        .route("/api/analyses/:id", get(handlers::analyze::get_analysis))
        .route("/api/analyses/:id/regenerate", post(handlers::analyze::regenerate))
        .route(
            "/api/analyses/:id/builds/:index/illustration",
            post(handlers::illustrations::request_illustration)
                .get(handlers::illustrations::get_illustration),
        )
        .route("/api/discover", get(handlers::discover::discover))
        .route("/api/discover/prefetch", post(handlers::discover::prefetch))
        .route("/api/discover/cache", delete(handlers::discover::clear_cache));

    if let Some(dir) = static_dir {
        info!("📁 Serving static files from {:?}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ========================================
// メイン
// ========================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログ初期化
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    let client = GeminiClient::new(&config).context("failed to build Gemini client")?;
    let addr = config.bind_addr.clone();
    let max_mb = config.max_upload_bytes / (1024 * 1024);

    let state = Arc::new(AppState::new(config, Arc::new(client)));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 BrickVision API listening on {}", addr);
    info!("📦 Max body size: {}MB", max_mb);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
