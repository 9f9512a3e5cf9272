//! Configuration loader and validator for the scheduling client.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub api: Api,
    pub dashboard: DashboardSettings,
    pub scheduling: Scheduling,
}

/// Post Store endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardSettings {
    pub refresh_interval_secs: u64,
    pub page_size: u32,
    /// Whether a failed background poll replaces the banner text.
    pub surface_silent_errors: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            page_size: 20,
            surface_silent_errors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scheduling {
    pub default_stagger_minutes: u32,
    pub max_stagger_minutes: u32,
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - `API_TOKEN` in the environment overrides `api.token`.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    if let Ok(token) = std::env::var("API_TOKEN") {
        if !token.trim().is_empty() {
            cfg.api.token = token;
        }
    }
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    if Url::parse(&cfg.api.base_url).is_err() {
        return Err(ConfigError::Invalid("api.base_url must be an absolute URL"));
    }
    if cfg.api.token.trim().is_empty() {
        return Err(ConfigError::Invalid("api.token must be non-empty"));
    }
    if cfg.api.timeout_secs == 0 {
        return Err(ConfigError::Invalid("api.timeout_secs must be > 0"));
    }

    if cfg.dashboard.refresh_interval_secs == 0 {
        return Err(ConfigError::Invalid("dashboard.refresh_interval_secs must be > 0"));
    }
    if cfg.dashboard.page_size == 0 || cfg.dashboard.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Invalid("dashboard.page_size must be between 1 and 100"));
    }

    let s = &cfg.scheduling;
    if s.max_stagger_minutes == 0 {
        return Err(ConfigError::Invalid("scheduling.max_stagger_minutes must be > 0"));
    }
    if s.default_stagger_minutes == 0 || s.default_stagger_minutes > s.max_stagger_minutes {
        return Err(ConfigError::Invalid(
            "scheduling.default_stagger_minutes must be between 1 and max_stagger_minutes",
        ));
    }

    Ok(())
}

/// Returns the reference YAML document.
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:8000/api/"
  token: "YOUR_API_TOKEN"
  timeout_secs: 30

dashboard:
  refresh_interval_secs: 30
  page_size: 20
  surface_silent_errors: true

scheduling:
  default_stagger_minutes: 30
  max_stagger_minutes: 1440
"#
}
