//! Scripted Gemini stand-in for tests.
//!
//! Responses are served in FIFO order and every call is recorded for
//! assertions. An empty script answers with an upstream 500.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

use crate::gemini::{
    Candidate, Content, GeminiError, GenerateContentRequest, GenerateContentResponse,
    GenerativeModel, GroundingChunk, GroundingMetadata, InlineData, Part, WebSource,
};

/// Record of a single generateContent call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Model name the call was routed to.
    pub model: String,
    /// Request body as it would go over the wire.
    pub body: Value,
}

#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<GenerateContentResponse, GeminiError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps before answering so callers can overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: GenerateContentResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub fn push_text(&self, text: &str) -> &Self {
        self.push_response(text_response(text, &[]))
    }

    pub fn push_error(&self, status: u16) -> &Self {
        self.responses.lock().push_back(Err(GeminiError::Api {
            status,
            body: "scripted failure".to_string(),
        }));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        self.calls.lock().push(RecordedCall {
            model: model.to_string(),
            body: serde_json::to_value(request).unwrap_or(Value::Null),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| {
            Err(GeminiError::Api {
                status: 500,
                body: "no scripted response".to_string(),
            })
        })
    }
}

fn single_candidate(
    parts: Vec<Part>,
    grounding: Option<GroundingMetadata>,
) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts,
            }),
            grounding_metadata: grounding,
        }],
    }
}

/// Text answer with optional web grounding sources `(title, uri)`.
pub fn text_response(text: &str, sources: &[(&str, &str)]) -> GenerateContentResponse {
    let grounding = if sources.is_empty() {
        None
    } else {
        Some(GroundingMetadata {
            grounding_chunks: sources
                .iter()
                .map(|(title, uri)| GroundingChunk {
                    web: Some(WebSource {
                        title: Some(title.to_string()),
                        uri: Some(uri.to_string()),
                    }),
                })
                .collect(),
        })
    };
    single_candidate(vec![Part::text(text)], grounding)
}

/// Image answer preceded by a text part, the way the image model replies.
pub fn image_response(mime_type: &str, data: &str) -> GenerateContentResponse {
    single_candidate(
        vec![
            Part::text("Here is your build."),
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                }),
            },
        ],
        None,
    )
}
