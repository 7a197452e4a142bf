/// Configuration for the dealflow client.
/// Reads config.json from ~/.config/dealflow/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use dealflow_core::analytics::AnalyticsConfig;
use dealflow_core::config::SessionOptions;

pub const API_KEY_ENV: &str = "DEALFLOW_API_KEY";
pub const BASE_URL_ENV: &str = "DEALFLOW_BASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionOptions,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Where the row store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No store URL configured (set store.baseUrl or {BASE_URL_ENV})")]
    MissingBaseUrl,

    #[error("No API key configured (set store.apiKey or {API_KEY_ENV})")]
    MissingApiKey,
}

impl AppConfig {
    /// Let non-empty environment values win over the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.store.base_url = url.trim().to_string();
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.store.api_key = key.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if self.store.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dealflow")
}

/// Default config path: ~/.config/dealflow/config.json
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[dealflow.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            AppConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[dealflow.config] No config at {}, using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}
