//! Prompt templates and response schemas for Gemini requests

use serde_json::{json, Value};

use crate::models::DiscoverTopic;

/// Items requested per discovery page
pub const DISCOVERY_PAGE_SIZE: usize = 15;

/// Inventory analysis + three micro-build ideas
pub const ANALYSIS_PROMPT: &str = r#"Analyze this photo of LEGO bricks.
1. Identify every visible brick as an inventory entry with quantity, color and size (e.g. "3x red 2x4 brick").
2. Determine the dominant colors.
3. Suggest exactly 3 creative "micro-build" ideas that could be made with a subset of these bricks.

INVENTORY RULES:
- Each build may only use bricks listed in the inventory, and never more of a piece than were counted.
- List the exact pieces each build uses in "requiredBricks".
- Builds must be physically possible: every piece connects stud-to-tube, nothing floats.

DIFFICULTY RULES:
- If the pile is large (>30 bricks), include 1 Easy, 1 Medium, and 1 Hard build.
- If the pile is small (<30 bricks), provide only Easy and Medium builds.

If no LEGO pieces are visible, return empty arrays for every field.

Return the result in valid JSON format matching the schema provided."#;

pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "identifiedBricks": { "type": "ARRAY", "items": { "type": "STRING" } },
            "colorPalette": { "type": "ARRAY", "items": { "type": "STRING" } },
            "suggestions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "icon": { "type": "STRING", "description": "A single emoji" },
                        "description": { "type": "STRING" },
                        "difficulty": { "type": "STRING", "enum": ["Easy", "Medium", "Hard"] },
                        "estimatedPieces": { "type": "INTEGER" },
                        "requiredBricks": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "steps": { "type": "ARRAY", "items": { "type": "STRING" } }
                    },
                    "required": [
                        "title", "icon", "description", "difficulty",
                        "estimatedPieces", "requiredBricks", "steps"
                    ]
                }
            }
        },
        "required": ["identifiedBricks", "colorPalette", "suggestions"]
    })
}

/// Illustration of a finished build using only its required pieces
pub fn illustration_prompt(title: &str, required_bricks: &[String]) -> String {
    let pieces = if required_bricks.is_empty() {
        "- (use only pieces visible in the photo)".to_string()
    } else {
        required_bricks
            .iter()
            .map(|b| format!("- {}", b))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Using the bricks in the provided photo as reference, draw a completed LEGO micro-build of a "{title}".

Use ONLY these pieces, and no others:
{pieces}

VISUAL RULES:
- Every piece is one uniform solid color, matching its color in the photo.
- Studs are the same color as the body of their piece.
- Flat cartoon illustration style with clean black outlines.
- Plain white background, no scenery, no text.

BUILD RULES:
- Pieces connect only stud-to-tube, the way real bricks do.
- No floating or unsupported pieces.
- Show the whole model, centered."#
    )
}

pub fn discovery_prompt(topic: DiscoverTopic, query: &str, page: u32) -> String {
    let subject = match topic {
        DiscoverTopic::Sets => "official LEGO sets",
        DiscoverTopic::Pieces => "individual LEGO parts and elements",
        DiscoverTopic::Minifigures => "LEGO minifigures",
        DiscoverTopic::Themes => "LEGO themes and product lines",
    };
    let filter = match query.trim() {
        "" => "Pick a varied mix of popular and notable entries.".to_string(),
        q => format!("Only include entries matching the search \"{}\".", q),
    };

    format!(
        r#"You are a LEGO archive. List exactly {size} {subject}. {filter}
This is page {page} of the results: skip the {skip} entries that earlier pages would have shown and do not repeat them.

For each entry return: id (official set/part/figure number, or a short slug for themes), title, type,
year, pieceCount, description, imageUrl (only if you know a real image URL), funFacts (2-3 short facts),
theme, subtheme, rarity ("Common", "Rare" or "Legendary"), marketPrice (e.g. "$49.99") and category.

Use Google Search to ground the facts. Return only a JSON array matching the schema, with no commentary."#,
        size = DISCOVERY_PAGE_SIZE,
        subject = subject,
        filter = filter,
        page = page,
        skip = u64::from(page.saturating_sub(1)) * DISCOVERY_PAGE_SIZE as u64,
    )
}

pub fn discovery_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "type": { "type": "STRING" },
                "year": { "type": "INTEGER" },
                "pieceCount": { "type": "INTEGER" },
                "description": { "type": "STRING" },
                "imageUrl": { "type": "STRING" },
                "funFacts": { "type": "ARRAY", "items": { "type": "STRING" } },
                "theme": { "type": "STRING" },
                "subtheme": { "type": "STRING" },
                "rarity": { "type": "STRING", "enum": ["Common", "Rare", "Legendary"] },
                "marketPrice": { "type": "STRING" },
                "category": { "type": "STRING" }
            },
            "required": ["id", "title", "type", "description", "funFacts", "rarity"]
        }
    })
}
