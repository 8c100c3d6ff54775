//! Build illustration generation
//!
//! One image per build instance. The tracker is the state machine
//! `NotRequested -> InFlight -> Succeeded | Failed`, and `Failed -> InFlight`
//! is the only way to ask the model again.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::ServiceError;
use crate::gemini::{GenerateContentRequest, GenerationConfig, GenerativeModel, Part};
use crate::media::{data_url, ImagePayload};
use crate::prompts::illustration_prompt;

pub const ILLUSTRATION_ASPECT_RATIO: &str = "16:9";

pub async fn generate_build_image(
    model: &dyn GenerativeModel,
    model_name: &str,
    source: &ImagePayload,
    title: &str,
    required_bricks: &[String],
) -> Result<String, ServiceError> {
    let request = GenerateContentRequest::user(vec![
        Part::image(source),
        Part::text(illustration_prompt(title, required_bricks)),
    ])
    .with_config(GenerationConfig::image(ILLUSTRATION_ASPECT_RATIO));

    let response = model.generate_content(model_name, &request).await?;

    match response.first_inline_data().filter(|d| !d.data.is_empty()) {
        Some(inline) => {
            let mime = if inline.mime_type.is_empty() {
                "image/png"
            } else {
                inline.mime_type.as_str()
            };
            info!(
                "🎨 Illustration ready for {:?} ({} bytes b64)",
                title,
                inline.data.len()
            );
            Ok(data_url(mime, &inline.data))
        }
        None => {
            warn!("❌ No inline image data for {:?}", title);
            Err(ServiceError::MissingImage)
        }
    }
}

// ========================================
// State machine
// ========================================

/// 1つのビルドカード = (解析ID, 提案インデックス)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildKey {
    pub analysis_id: Uuid,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum IllustrationState {
    NotRequested,
    InFlight,
    Succeeded {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Failed {
        error: String,
    },
}

/// `ensure` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IllustrationOutcome {
    Ready(String),
    Pending,
    Failed(String),
}

enum Begin {
    Start,
    InFlight,
    Ready(String),
}

#[derive(Default)]
pub struct IllustrationTracker {
    states: Mutex<HashMap<BuildKey, IllustrationState>>,
}

impl IllustrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &BuildKey) -> IllustrationState {
        self.states
            .lock()
            .get(key)
            .cloned()
            .unwrap_or(IllustrationState::NotRequested)
    }

    /// 生成を開始するか、既存の結果 / 進行中を返す
    ///
    /// 生成は別タスクで走るので、呼び出し側が切断しても状態は InFlight のまま残らない。
    pub async fn ensure<Fut>(self: &Arc<Self>, key: BuildKey, generate: Fut) -> IllustrationOutcome
    where
        Fut: Future<Output = Result<String, ServiceError>> + Send + 'static,
    {
        match self.begin(key) {
            Begin::Ready(url) => IllustrationOutcome::Ready(url),
            Begin::InFlight => IllustrationOutcome::Pending,
            Begin::Start => {
                let tracker = Arc::clone(self);
                let handle = tokio::spawn(async move {
                    let result = generate.await.map_err(|e| e.to_string());
                    tracker.finish(key, result.clone());
                    result
                });

                match handle.await {
                    Ok(Ok(url)) => IllustrationOutcome::Ready(url),
                    Ok(Err(message)) => IllustrationOutcome::Failed(message),
                    Err(e) => {
                        let message = format!("illustration task aborted: {}", e);
                        self.finish(key, Err(message.clone()));
                        IllustrationOutcome::Failed(message)
                    }
                }
            }
        }
    }

    /// 削除されたセッションのカードを忘れる
    pub fn retain_analyses<F>(&self, mut keep: F)
    where
        F: FnMut(&Uuid) -> bool,
    {
        self.states.lock().retain(|key, _| keep(&key.analysis_id));
    }

    fn begin(&self, key: BuildKey) -> Begin {
        let mut states = self.states.lock();
        match states.get(&key) {
            Some(IllustrationState::Succeeded { image_url }) => Begin::Ready(image_url.clone()),
            Some(IllustrationState::InFlight) => Begin::InFlight,
            Some(IllustrationState::NotRequested)
            | Some(IllustrationState::Failed { .. })
            | None => {
                states.insert(key, IllustrationState::InFlight);
                Begin::Start
            }
        }
    }

    fn finish(&self, key: BuildKey, result: Result<String, String>) {
        let next = match result {
            Ok(image_url) => IllustrationState::Succeeded { image_url },
            Err(error) => {
                warn!("⚠️  Illustration failed for {:?}: {}", key, error);
                IllustrationState::Failed { error }
            }
        };
        self.states.lock().insert(key, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{image_response, text_response, ScriptedModel};
    use std::time::Duration;

    fn photo() -> ImagePayload {
        ImagePayload {
            mime_type: "image/png".to_string(),
            data: "iVBORw0KGgo".to_string(),
        }
    }

    fn key(index: usize) -> BuildKey {
        BuildKey {
            analysis_id: Uuid::nil(),
            index,
        }
    }

    fn bricks() -> Vec<String> {
        vec!["2x yellow 2x4 brick".to_string()]
    }

    #[tokio::test]
    async fn wraps_inline_image_as_data_url() {
        let model = ScriptedModel::new();
        model.push_response(image_response("image/png", "QUJD"));

        let url = generate_build_image(&model, "img", &photo(), "Duck", &bricks())
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,QUJD");

        let body = &model.calls()[0].body;
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        let prompt = body["contents"][0]["parts"][1]["text"].as_str().unwrap();
        assert!(prompt.contains("- 2x yellow 2x4 brick"));
    }

    #[tokio::test]
    async fn missing_inline_data_is_an_error() {
        let model = ScriptedModel::new();
        model.push_response(text_response("I can't draw that.", &[]));
        model.push_response(image_response("image/png", ""));

        let first = generate_build_image(&model, "img", &photo(), "Duck", &bricks()).await;
        assert!(matches!(first, Err(ServiceError::MissingImage)));

        let second = generate_build_image(&model, "img", &photo(), "Duck", &bricks()).await;
        assert!(matches!(second, Err(ServiceError::MissingImage)));
    }

    #[tokio::test]
    async fn succeeded_illustrations_are_memoized() {
        let model = Arc::new(ScriptedModel::new());
        model.push_response(image_response("image/png", "QUJD"));
        let tracker = Arc::new(IllustrationTracker::new());

        for _ in 0..3 {
            let m = model.clone();
            let outcome = tracker
                .ensure(key(0), async move {
                    generate_build_image(&*m, "img", &photo(), "Duck", &bricks()).await
                })
                .await;
            assert_eq!(
                outcome,
                IllustrationOutcome::Ready("data:image/png;base64,QUJD".to_string())
            );
        }

        assert_eq!(model.call_count(), 1);
        assert!(matches!(tracker.state(&key(0)), IllustrationState::Succeeded { .. }));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_generation() {
        let model = Arc::new(ScriptedModel::new().with_delay(Duration::from_millis(50)));
        model.push_response(image_response("image/png", "QUJD"));
        let tracker = Arc::new(IllustrationTracker::new());

        let run = |tracker: Arc<IllustrationTracker>, model: Arc<ScriptedModel>| async move {
            tracker
                .ensure(key(1), async move {
                    generate_build_image(&*model, "img", &photo(), "Duck", &bricks()).await
                })
                .await
        };

        let first = tokio::spawn(run(tracker.clone(), model.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = run(tracker.clone(), model.clone()).await;

        assert_eq!(second, IllustrationOutcome::Pending);
        assert!(matches!(first.await.unwrap(), IllustrationOutcome::Ready(_)));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn failure_allows_exactly_one_retry_path() {
        let model = Arc::new(ScriptedModel::new());
        model.push_response(text_response("no image", &[]));
        model.push_response(image_response("image/jpeg", "WFla"));
        let tracker = Arc::new(IllustrationTracker::new());

        let attempt = |tracker: Arc<IllustrationTracker>, model: Arc<ScriptedModel>| async move {
            tracker
                .ensure(key(2), async move {
                    generate_build_image(&*model, "img", &photo(), "Duck", &bricks()).await
                })
                .await
        };

        let failed = attempt(tracker.clone(), model.clone()).await;
        assert_eq!(failed, IllustrationOutcome::Failed("Image generation failed".to_string()));
        assert!(matches!(tracker.state(&key(2)), IllustrationState::Failed { .. }));

        let retried = attempt(tracker.clone(), model.clone()).await;
        assert_eq!(retried, IllustrationOutcome::Ready("data:image/jpeg;base64,WFla".to_string()));
        assert_eq!(model.call_count(), 2);
    }

    #[test]
    fn states_serialize_with_status_tag() {
        let json = serde_json::to_value(IllustrationState::Succeeded {
            image_url: "data:image/png;base64,QQ==".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["imageUrl"], "data:image/png;base64,QQ==");
        assert_eq!(
            serde_json::to_value(IllustrationState::InFlight).unwrap()["status"],
            "inFlight"
        );
    }

    #[test]
    fn retain_drops_forgotten_analyses() {
        let tracker = IllustrationTracker::new();
        tracker.finish(key(0), Ok("data:image/png;base64,QQ==".to_string()));
        tracker.retain_analyses(|_| false);
        assert_eq!(tracker.state(&key(0)), IllustrationState::NotRequested);
    }
}
