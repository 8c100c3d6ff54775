//! Discovery catalog
//! (topic, query, page) → DiscoverItem 一覧。検索グラウンディング付き、結果はキャッシュ。

use std::sync::Arc;
use tracing::{info, warn};

use super::ServiceError;
use crate::cache::BoundedCache;
use crate::gemini::{GenerateContentRequest, GenerationConfig, GenerativeModel, Part};
use crate::models::{DiscoverItem, DiscoverTopic, RawDiscoverItem};
use crate::prompts::{discovery_prompt, discovery_schema};

/// 各項目に付ける出典の上限
pub const MAX_SOURCE_URLS: usize = 3;

/// この件数以上返ってきたら次のページがあるとみなす（推測）
pub const MORE_PAGES_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryKey {
    pub topic: DiscoverTopic,
    pub query: String,
    pub page: u32,
}

pub type DiscoveryCache = BoundedCache<DiscoveryKey, Arc<Vec<DiscoverItem>>>;

#[derive(Debug, Clone)]
pub struct DiscoveryPage {
    pub items: Arc<Vec<DiscoverItem>>,
    pub cached: bool,
}

impl DiscoveryPage {
    pub fn has_next_page(&self) -> bool {
        has_next_page(self.items.len())
    }
}

pub fn has_next_page(batch_len: usize) -> bool {
    batch_len >= MORE_PAGES_THRESHOLD
}

pub async fn get_discovery_data(
    model: &dyn GenerativeModel,
    model_name: &str,
    cache: &DiscoveryCache,
    topic: DiscoverTopic,
    query: &str,
    page: u32,
) -> Result<DiscoveryPage, ServiceError> {
    let key = DiscoveryKey {
        topic,
        query: query.to_string(),
        page,
    };

    if let Some(items) = cache.get(&key) {
        info!("📦 Discovery cache hit: {} {:?} p{}", topic, query, page);
        return Ok(DiscoveryPage { items, cached: true });
    }

    let request = GenerateContentRequest::user(vec![Part::text(discovery_prompt(
        topic, query, page,
    ))])
    .with_config(GenerationConfig::json(discovery_schema()))
    .with_google_search();

    let response = model.generate_content(model_name, &request).await?;
    let raw_items = parse_discovery(&response.text())?;
    let sources = response.grounding_sources(MAX_SOURCE_URLS);

    let items: Vec<DiscoverItem> = raw_items
        .into_iter()
        .map(|raw| {
            let image_url = raw
                .image_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| fallback_image_url(topic, &raw.id));
            DiscoverItem::from_raw(raw, image_url, sources.clone())
        })
        .collect();

    info!(
        "🔎 Discovery fetched: {} {:?} p{} → {} items, {} sources",
        topic,
        query,
        page,
        items.len(),
        sources.len()
    );

    let items = Arc::new(items);
    cache.insert(key, items.clone());
    Ok(DiscoveryPage {
        items,
        cached: false,
    })
}

/// JSON 配列をパース。グラウンディング時は前後に説明文が付くことがあるので配列部分だけ拾う。
pub fn parse_discovery(text: &str) -> Result<Vec<RawDiscoverItem>, ServiceError> {
    if text.trim().is_empty() {
        return Err(ServiceError::EmptyResponse);
    }

    match serde_json::from_str(text) {
        Ok(items) => Ok(items),
        Err(first_err) => parse_embedded_array(text).ok_or_else(|| {
            warn!("❌ Discovery response did not contain a parsable JSON array: {}", first_err);
            ServiceError::Parse(first_err.to_string())
        }),
    }
}

/// 文中に埋め込まれた配列を探す
///
/// `[1]` のような引用番号が前後に付くので、開き括弧は左から、閉じ括弧は右から順に試す。
fn parse_embedded_array(raw: &str) -> Option<Vec<RawDiscoverItem>> {
    let starts = raw.match_indices('[').map(|(i, _)| i).filter(|&i| {
        matches!(raw[i + 1..].trim_start().chars().next(), Some('{') | Some(']'))
    });

    for start in starts {
        let parsed = raw
            .match_indices(']')
            .rev()
            .map(|(end, _)| end)
            .filter(|&end| end > start)
            .find_map(|end| serde_json::from_str(&raw[start..=end]).ok());
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}

/// 小文字英数字 + ハイフンに正規化
pub fn normalize_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if matches!(c, '-' | '_' | ' ' | '/' | '.') && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// imageUrl が無い項目用の決定的なフォールバックURL
pub fn fallback_image_url(topic: DiscoverTopic, id: &str) -> String {
    let id = normalize_id(id);
    match topic {
        DiscoverTopic::Sets => {
            // Brickset はバリアント番号付き（10497-1）
            let set_number = if id.chars().all(|c| c.is_ascii_digit()) {
                format!("{}-1", id)
            } else {
                id
            };
            format!("https://images.brickset.com/sets/images/{}.jpg", set_number)
        }
        DiscoverTopic::Minifigures => {
            format!("https://img.bricklink.com/ItemImage/MN/0/{}.png", id)
        }
        DiscoverTopic::Pieces | DiscoverTopic::Themes => format!(
            "https://placehold.co/600x600/FFD500/0055BF?text={}",
            urlencoding::encode(&format!("{} {}", topic, id))
        ),
    }
}
