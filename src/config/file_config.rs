use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub cors_origins: Option<Vec<String>>,
    pub synthesis_url: Option<String>,
    pub synthesis_timeout_sec: Option<u64>,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: Option<u64>,

    // Feature configs
    pub oauth: Option<OAuthConfig>,
    pub blob: Option<BlobConfig>,
    pub listing: Option<ListingConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BlobConfig {
    pub root_dir: Option<String>,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ListingConfig {
    pub recent_limit: Option<usize>,
    pub popular_limit: Option<usize>,
    pub collection_limit: Option<usize>,
    pub max_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
