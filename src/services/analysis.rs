//! Brick pile analysis
//! 写真 → 在庫 + ビルド提案（1回の generateContent、キャッシュなし）

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::ServiceError;
use crate::cache::BoundedCache;
use crate::gemini::{GenerateContentRequest, GenerationConfig, GenerativeModel, Part};
use crate::media::ImagePayload;
use crate::models::VisionAnalysisResult;
use crate::prompts::{analysis_schema, ANALYSIS_PROMPT};

/// 解析済みセッション（元画像をサーバー側に保持）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSession {
    pub id: Uuid,
    #[serde(skip)]
    pub source: ImagePayload,
    pub result: VisionAnalysisResult,
    pub created_at_ms: i64,
}

pub type SessionStore = BoundedCache<Uuid, Arc<AnalysisSession>>;

pub async fn analyze_brick_pile(
    model: &dyn GenerativeModel,
    model_name: &str,
    image: &ImagePayload,
) -> Result<VisionAnalysisResult, ServiceError> {
    let request = GenerateContentRequest::user(vec![
        Part::image(image),
        Part::text(ANALYSIS_PROMPT),
    ])
    .with_config(GenerationConfig::json(analysis_schema()));

    let response = model.generate_content(model_name, &request).await?;
    let result = parse_analysis(&response.text())?;

    info!(
        "🧱 Analysis done: {} bricks, {} colors, {} suggestions",
        result.identified_bricks.len(),
        result.color_palette.len(),
        result.suggestions.len()
    );
    Ok(result)
}

/// 解析 → セッション登録
pub async fn analyze_into_session(
    model: &dyn GenerativeModel,
    model_name: &str,
    sessions: &SessionStore,
    image: ImagePayload,
) -> Result<Arc<AnalysisSession>, ServiceError> {
    let result = analyze_brick_pile(model, model_name, &image).await?;

    let session = Arc::new(AnalysisSession {
        id: Uuid::new_v4(),
        source: image,
        result,
        created_at_ms: chrono::Utc::now().timestamp_millis(),
    });
    sessions.insert(session.id, session.clone());
    Ok(session)
}

/// レスポンステキストを厳密にパース（部分的な復元はしない）
pub fn parse_analysis(text: &str) -> Result<VisionAnalysisResult, ServiceError> {
    if text.trim().is_empty() {
        warn!("❌ Empty analysis response");
        return Err(ServiceError::EmptyResponse);
    }

    serde_json::from_str(text).map_err(|e| {
        warn!("❌ Failed to parse Gemini response: {}", e);
        ServiceError::Parse(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use serde_json::json;

    fn photo() -> ImagePayload {
        ImagePayload {
            mime_type: "image/jpeg".to_string(),
            data: "/9j/4AAQ".to_string(),
        }
    }

    fn three_builds() -> String {
        let build = |title: &str, difficulty: &str| {
            json!({
                "title": title,
                "icon": "🚀",
                "description": "Small and fun",
                "difficulty": difficulty,
                "estimatedPieces": 8,
                "requiredBricks": ["2x red 2x2 brick"],
                "steps": ["Place the base", "Add the top"]
            })
        };
        json!({
            "identifiedBricks": ["4x red 2x2 brick", "2x white 1x4 plate"],
            "colorPalette": ["red", "white"],
            "suggestions": [
                build("Rocket", "Easy"),
                build("Robot", "Medium"),
                build("Castle", "Hard")
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn sends_image_prompt_and_schema() {
        let model = ScriptedModel::new();
        model.push_text(&three_builds());

        let result = analyze_brick_pile(&model, "vision-model", &photo()).await.unwrap();
        assert_eq!(result.suggestions.len(), 3);
        assert!(!result.no_bricks_found());

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "vision-model");
        let parts = &calls[0].body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert!(parts[1]["text"].as_str().unwrap().contains("exactly 3"));
        assert_eq!(
            calls[0].body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn empty_text_is_an_error() {
        let model = ScriptedModel::new();
        model.push_text("");

        let err = analyze_brick_pile(&model, "m", &photo()).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyResponse));
        assert!(err.is_parse_failure());
    }

    #[tokio::test]
    async fn invalid_json_is_an_error() {
        let model = ScriptedModel::new();
        model.push_text("{\"identifiedBricks\": [\"1x red brick\"], \"colorPalette\": [");

        let err = analyze_brick_pile(&model, "m", &photo()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Parse(_)));
    }

    #[tokio::test]
    async fn upstream_failures_are_not_parse_failures() {
        let model = ScriptedModel::new();
        model.push_error(503);

        let err = analyze_brick_pile(&model, "m", &photo()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
        assert!(!err.is_parse_failure());
    }

    #[test]
    fn empty_pile_is_reported_as_no_bricks() {
        let result = parse_analysis(
            r#"{"identifiedBricks": [], "colorPalette": [], "suggestions": []}"#,
        )
        .unwrap();
        assert!(result.no_bricks_found());
    }

    #[tokio::test]
    async fn sessions_keep_the_source_image() {
        let model = ScriptedModel::new();
        model.push_text(&three_builds());
        let sessions = SessionStore::new(4, None);

        let session = analyze_into_session(&model, "m", &sessions, photo()).await.unwrap();
        let stored = sessions.get(&session.id).unwrap();
        assert_eq!(stored.source, photo());
        assert_eq!(stored.result.suggestions[2].title, "Castle");
    }
}
