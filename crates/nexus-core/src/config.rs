use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const BACKEND_URL_ENV: &str = "NEXUS_BACKEND_URL";

pub const DEFAULT_HEALTH_RETRIES: u32 = 10;
pub const DEFAULT_HEALTH_RETRY_DELAY_MS: u64 = 2_000;
/// Generous upload window: the first ingest may have to load models on a cold backend.
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 120_000;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub health_retries: Option<u32>,
    pub health_retry_delay_ms: Option<u64>,
    pub upload_timeout_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    pub fn save_backend_url(url: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.backend_url = Some(normalize_origin(url));
        config.save()
    }

    /// Resolve the backend origin: explicit override, then `NEXUS_BACKEND_URL`,
    /// then the config file, then the built-in default.
    pub fn resolve_backend_url(&self, cli_override: Option<&str>) -> String {
        let env_value = std::env::var(BACKEND_URL_ENV).ok();
        pick_backend_url(cli_override, env_value.as_deref(), self.backend_url.as_deref())
    }

    pub fn health_retries(&self) -> u32 {
        self.health_retries.unwrap_or(DEFAULT_HEALTH_RETRIES)
    }

    pub fn health_retry_delay(&self) -> Duration {
        Duration::from_millis(self.health_retry_delay_ms.unwrap_or(DEFAULT_HEALTH_RETRY_DELAY_MS))
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms.unwrap_or(DEFAULT_UPLOAD_TIMEOUT_MS))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.unwrap_or(DEFAULT_QUERY_TIMEOUT_MS))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("nexus").join("config.json"))
    }
}

fn pick_backend_url(cli: Option<&str>, env: Option<&str>, file: Option<&str>) -> String {
    [cli, env, file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(normalize_origin)
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

/// Strip trailing slashes so endpoint paths can be appended verbatim.
pub fn normalize_origin(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
