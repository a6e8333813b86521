//! Layered configuration: built-in defaults, then `auditdash.toml`, then
//! `AUDITDASH_*` environment variables (`__` separates nested keys, e.g.
//! `AUDITDASH_SERVER__PORT=8080`).

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::security::keyring::KeyringManager;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

pub const CONFIG_FILE: &str = "auditdash.toml";
pub const ENV_PREFIX: &str = "AUDITDASH_";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL; defaults to a file inside the data directory.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[validate(nested)]
    pub llm: LLMConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            llm: LLMConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `.env`, then defaults → `config_path` → environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = config_path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))?;
        config
            .validate()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))?;
        Ok(config)
    }
}

pub struct ConfigService {
    keyring: KeyringManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            keyring: KeyringManager::new("auditdash"),
        }
    }

    pub fn save_api_key(&self, provider: &str, key: &str) -> Result<()> {
        self.keyring.set_secret(provider, key)
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>> {
        self.keyring.get_secret(provider)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<()> {
        self.keyring.delete_secret(provider)
    }

    /// The configured key wins; otherwise fall back to the OS keyring.
    pub fn resolve_llm_config(&self, config: &LLMConfig) -> LLMConfig {
        let mut resolved = config.clone();
        resolved.api_key = match non_blank_key(config) {
            Some(key) => Some(key),
            None => {
                let provider = format!("{:?}", config.provider);
                self.get_api_key(&provider).ok().flatten()
            }
        };
        resolved
    }
}

fn non_blank_key(config: &LLMConfig) -> Option<String> {
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// Apply a caller-supplied endpoint on top of the resolved server config.
///
/// The server's key is carried over only when `requested` targets the same
/// provider and base URL and brings no key of its own; any other endpoint
/// runs with exactly the key the caller sent.
pub fn overlay_llm_config(server: &LLMConfig, requested: &LLMConfig) -> LLMConfig {
    let mut resolved = requested.clone();
    resolved.api_key = non_blank_key(requested);
    if resolved.api_key.is_none() && server.same_endpoint(requested) {
        resolved.api_key = non_blank_key(server);
    }
    resolved
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
