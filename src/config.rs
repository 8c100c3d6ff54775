//! Configuration
//! デフォルト値 + 環境変数で上書き

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub api_key: String,
    pub gemini_base_url: String,
    pub vision_model: String,
    pub image_model: String,
    pub discovery_model: String,
    pub max_upload_bytes: usize,
    pub discovery_cache_capacity: usize,
    pub discovery_cache_ttl: Option<Duration>,
    pub session_capacity: usize,
    pub upstream_timeout: Option<Duration>,
    pub static_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            api_key: String::new(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            vision_model: "gemini-3-flash-preview".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            discovery_model: "gemini-3-flash-preview".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
            discovery_cache_capacity: 512,
            discovery_cache_ttl: None,
            session_capacity: 128,
            upstream_timeout: None,
            static_dir: None,
        }
    }
}

impl AppConfig {
    /// 環境変数から読み込み
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` で値を解決する（テストでは HashMap を渡す）
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.api_key = match get("GEMINI_API_KEY").or_else(|| get("API_KEY")) {
            Some(key) => key,
            None => bail!("GEMINI_API_KEY (or API_KEY) must be set"),
        };

        if let Some(addr) = get("BRICKVISION_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("BRICKVISION_VISION_MODEL") {
            config.vision_model = model;
        }
        if let Some(model) = get("BRICKVISION_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(model) = get("BRICKVISION_DISCOVERY_MODEL") {
            config.discovery_model = model;
        }
        if let Some(mb) = get("BRICKVISION_MAX_UPLOAD_MB") {
            let mb: usize = parse_var("BRICKVISION_MAX_UPLOAD_MB", &mb)?;
            config.max_upload_bytes = mb * 1024 * 1024;
        }
        if let Some(cap) = get("BRICKVISION_DISCOVERY_CACHE_CAPACITY") {
            config.discovery_cache_capacity =
                parse_var("BRICKVISION_DISCOVERY_CACHE_CAPACITY", &cap)?;
        }
        if let Some(secs) = get("BRICKVISION_DISCOVERY_CACHE_TTL_SECS") {
            let secs: u64 = parse_var("BRICKVISION_DISCOVERY_CACHE_TTL_SECS", &secs)?;
            config.discovery_cache_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(cap) = get("BRICKVISION_SESSION_CAPACITY") {
            config.session_capacity = parse_var("BRICKVISION_SESSION_CAPACITY", &cap)?;
        }
        if let Some(secs) = get("BRICKVISION_UPSTREAM_TIMEOUT_SECS") {
            let secs: u64 = parse_var("BRICKVISION_UPSTREAM_TIMEOUT_SECS", &secs)?;
            config.upstream_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(dir) = get("BRICKVISION_STATIC_DIR") {
            config.static_dir = Some(PathBuf::from(dir));
        }

        if config.discovery_cache_capacity == 0 || config.session_capacity == 0 {
            bail!("cache capacities must be greater than zero");
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value for {}: {:?}", key, raw))
}
