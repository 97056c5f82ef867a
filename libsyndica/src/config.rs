//! Configuration management for Syndica

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub facebook: Option<FacebookConfig>,
    pub instagram: Option<InstagramConfig>,
    pub twitter: Option<TwitterConfig>,
    pub tiktok: Option<TikTokConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Platforms selected when the caller does not name any.
    #[serde(default)]
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached read responses, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub enabled: bool,
    /// The page the account posts as.
    pub page_id: String,
    /// File holding the page access token.
    pub access_token_file: String,
    #[serde(default = "default_graph_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub enabled: bool,
    /// The professional account id used by the content publishing API.
    pub account_id: String,
    pub access_token_file: String,
    #[serde(default = "default_graph_url")]
    pub base_url: String,
    /// Explicit simulation mode: posts whose media cannot be made publicly
    /// reachable get a `sim-` prefixed identifier instead of failing. Off by
    /// default; write operations always refuse simulated identifiers.
    #[serde(default)]
    pub simulate_demo_media: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub enabled: bool,
    /// The numeric user id whose timeline is sampled for stats.
    pub user_id: String,
    pub client_id: String,
    pub client_secret_file: String,
    /// JSON file holding `access_token`, `refresh_token` and `expires_at`.
    pub token_file: String,
    #[serde(default = "default_twitter_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikTokConfig {
    pub enabled: bool,
    pub client_key: String,
    pub client_secret_file: String,
    pub token_file: String,
    #[serde(default = "default_tiktok_url")]
    pub base_url: String,
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_twitter_url() -> String {
    "https://api.twitter.com/2".to_string()
}

fn default_tiktok_url() -> String {
    "https://open.tiktokapis.com/v2".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Platform toggles as declared in the config, in stable order.
    pub fn enabled_platforms(&self) -> Vec<crate::types::PlatformId> {
        use crate::types::PlatformId;
        let mut out = Vec::new();
        if self.facebook.as_ref().is_some_and(|c| c.enabled) {
            out.push(PlatformId::Facebook);
        }
        if self.instagram.as_ref().is_some_and(|c| c.enabled) {
            out.push(PlatformId::Instagram);
        }
        if self.twitter.as_ref().is_some_and(|c| c.enabled) {
            out.push(PlatformId::Twitter);
        }
        if self.tiktok.as_ref().is_some_and(|c| c.enabled) {
            out.push(PlatformId::TikTok);
        }
        out
    }
}

/// Resolve the post state file path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICA_DATA") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("syndica").join("posts.json"))
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICA_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndica").join("config.toml"))
}
