//! Gemini を使う業務ロジック
//! analysis / illustration / discovery

pub mod analysis;
pub mod discovery;
pub mod illustration;

use crate::gemini::GeminiError;

/// 解析失敗時にユーザーへ見せる文言
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Could not analyze your bricks. Please try again with a clearer photo.";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Empty response from AI")]
    EmptyResponse,
    #[error("Failed to parse AI response: {0}")]
    Parse(String),
    #[error("Image generation failed")]
    MissingImage,
    #[error(transparent)]
    Upstream(#[from] GeminiError),
}

impl ServiceError {
    /// 解析・ディスカバリーのパース失敗か
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, ServiceError::EmptyResponse | ServiceError::Parse(_))
    }
}
