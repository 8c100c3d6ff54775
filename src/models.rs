//! Data Models
//! 解析結果・ビルド提案・ディスカバリー項目などのデータ構造定義

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ========================================
// Vision Analysis
// ========================================

/// ビルド難易度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(alias = "easy", alias = "EASY")]
    Easy,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "hard", alias = "HARD")]
    Hard,
}

/// ビルド提案（最新スキーマ: requiredBricks あり）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSuggestion {
    pub title: String,
    pub icon: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(deserialize_with = "lenient::count")]
    pub estimated_pieces: u32,
    pub required_bricks: Vec<String>,
    pub steps: Vec<String>,
}

/// Gemini の解析レスポンス
///
/// 必須フィールドが欠けていればパース自体が失敗する。
/// `requiredBricks` が在庫の部分集合かどうかは検証しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionAnalysisResult {
    pub identified_bricks: Vec<String>,
    pub color_palette: Vec<String>,
    pub suggestions: Vec<BuildSuggestion>,
}

impl VisionAnalysisResult {
    /// 写真からブロックが見つからなかった
    pub fn no_bricks_found(&self) -> bool {
        self.identified_bricks.is_empty()
    }
}

// ========================================
// Discovery
// ========================================

/// ディスカバリーのタブ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverTopic {
    Sets,
    Pieces,
    Minifigures,
    Themes,
}

impl DiscoverTopic {
    pub const ALL: [DiscoverTopic; 4] = [
        DiscoverTopic::Sets,
        DiscoverTopic::Pieces,
        DiscoverTopic::Minifigures,
        DiscoverTopic::Themes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverTopic::Sets => "sets",
            DiscoverTopic::Pieces => "pieces",
            DiscoverTopic::Minifigures => "minifigures",
            DiscoverTopic::Themes => "themes",
        }
    }
}

impl fmt::Display for DiscoverTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// レア度（未知の値は Common 扱い）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Rarity {
    Common,
    Rare,
    Legendary,
}

impl From<String> for Rarity {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "legendary" => Rarity::Legendary,
            "rare" => Rarity::Rare,
            _ => Rarity::Common,
        }
    }
}

/// 検索グラウンディングの出典
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUrl {
    pub title: String,
    pub uri: String,
}

/// Gemini が返すカタログ項目（imageUrl は任意）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiscoverItem {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, deserialize_with = "lenient::opt_count")]
    pub year: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_count")]
    pub piece_count: Option<u32>,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub fun_facts: Vec<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub subtheme: Option<String>,
    pub rarity: Rarity,
    #[serde(default)]
    pub market_price: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// API返却用のカタログ項目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_count: Option<u32>,
    pub description: String,
    pub image_url: String,
    pub fun_facts: Vec<String>,
    pub source_urls: Vec<SourceUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtheme: Option<String>,
    pub rarity: Rarity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl DiscoverItem {
    pub fn from_raw(raw: RawDiscoverItem, image_url: String, source_urls: Vec<SourceUrl>) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            item_type: raw.item_type,
            year: raw.year,
            piece_count: raw.piece_count,
            description: raw.description,
            image_url,
            fun_facts: raw.fun_facts,
            source_urls,
            theme: raw.theme,
            subtheme: raw.subtheme,
            rarity: raw.rarity,
            market_price: raw.market_price,
            category: raw.category,
        }
    }
}

// ========================================
// Lenient number handling
// ========================================

/// モデルは数値を `12`, `12.0`, `"12"` のどれでも返してくる
mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberLike {
        Int(u64),
        Float(f64),
        Text(String),
    }

    impl NumberLike {
        fn as_u32(&self) -> Option<u32> {
            match self {
                NumberLike::Int(n) => u32::try_from(*n).ok(),
                NumberLike::Float(f) => float_to_u32(*f),
                NumberLike::Text(s) => {
                    let s = s.trim();
                    match s.parse::<f64>() {
                        Ok(f) => float_to_u32(f),
                        // "8-10" のような範囲は先頭の数字だけ使う
                        Err(_) => {
                            let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
                            s[..end].parse().ok()
                        }
                    }
                }
            }
        }
    }

    fn float_to_u32(f: f64) -> Option<u32> {
        if f.is_finite() && f >= 0.0 && f <= u32::MAX as f64 {
            Some(f.round() as u32)
        } else {
            None
        }
    }

    pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = NumberLike::deserialize(deserializer)?;
        value
            .as_u32()
            .ok_or_else(|| serde::de::Error::custom("expected a non-negative count"))
    }

    pub fn opt_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<NumberLike>::deserialize(deserializer)?;
        Ok(value.and_then(|v| v.as_u32()))
    }

    pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match NumberLike::deserialize(deserializer)? {
            NumberLike::Int(n) => n.to_string(),
            NumberLike::Float(f) => f.to_string(),
            NumberLike::Text(s) => s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suggestion_accepts_float_piece_counts() {
        let build: BuildSuggestion = serde_json::from_value(json!({
            "title": "Tiny Duck",
            "icon": "🦆",
            "description": "A yellow duck",
            "difficulty": "easy",
            "estimatedPieces": 12.0,
            "requiredBricks": ["2x yellow 2x4 brick"],
            "steps": ["Stack the bricks"]
        }))
        .unwrap();

        assert_eq!(build.difficulty, Difficulty::Easy);
        assert_eq!(build.estimated_pieces, 12);
    }

    fn pieces_from(raw: serde_json::Value) -> Option<u32> {
        let item: RawDiscoverItem = serde_json::from_value(json!({
            "id": "3001",
            "title": "Brick 2 x 4",
            "type": "piece",
            "description": "The classic",
            "rarity": "Common",
            "pieceCount": raw
        }))
        .unwrap();
        item.piece_count
    }

    #[test]
    fn numeric_strings_are_read_as_numbers() {
        assert_eq!(pieces_from(json!("12")), Some(12));
        assert_eq!(pieces_from(json!(" 12.0 ")), Some(12));
        assert_eq!(pieces_from(json!("12.5")), Some(13));
        assert_eq!(pieces_from(json!("8-10")), Some(8));
        assert_eq!(pieces_from(json!("about 40")), None);
        assert_eq!(pieces_from(json!("-3")), None);
    }

    #[test]
    fn analysis_requires_every_top_level_array() {
        let partial = serde_json::from_value::<VisionAnalysisResult>(json!({
            "identifiedBricks": ["1x red 2x2 brick"],
            "colorPalette": ["red"]
        }));
        assert!(partial.is_err());
    }

    #[test]
    fn unknown_rarity_reads_as_common() {
        let item: RawDiscoverItem = serde_json::from_value(json!({
            "id": 10497,
            "title": "Galaxy Explorer",
            "type": "set",
            "year": "2022",
            "description": "Classic space",
            "rarity": "Ultra"
        }))
        .unwrap();

        assert_eq!(item.id, "10497");
        assert_eq!(item.year, Some(2022));
        assert_eq!(item.rarity, Rarity::Common);
        assert!(item.image_url.is_none());
        assert!(item.fun_facts.is_empty());
    }

    #[test]
    fn topic_round_trips_through_query_names() {
        for topic in DiscoverTopic::ALL {
            let parsed: DiscoverTopic = serde_json::from_value(json!(topic.as_str())).unwrap();
            assert_eq!(parsed, topic);
        }
    }
}
