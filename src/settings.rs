//! User settings: backend location, timing and log level
//!
//! Stored as JSON under the platform config dir. A missing file is created
//! with defaults; missing keys take defaults. The API URL can be overridden
//! from the environment, and the CLI flag overrides both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{api, config, layout, validation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
    /// Override for the durable workspace file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: api::DEFAULT_URL.to_string(),
            debounce_ms: layout::DEBOUNCE_MS,
            request_timeout_secs: api::DEFAULT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            workspace_file: None,
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    /// Load from the default location, applying process environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path(), |key| std::env::var(key).ok())
    }

    /// Load from `path`, creating it with defaults when missing
    ///
    /// `env` looks up environment variables by name.
    pub fn load_from<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON from {:?}", path))?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let settings = Settings::default();
            settings.save_to(path)?;
            settings
        };

        if let Some(url) = env(config::ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            info!(api_url = %url, "Using API URL from environment");
            settings.api_url = url;
        }
        settings.validate_and_clamp();
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to {:?}", path))?;
        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// CLI override; wins over both file and environment
    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api_url = url;
            self.validate_and_clamp();
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate_and_clamp(&mut self) {
        if self.api_url.trim().is_empty() {
            warn!(using = api::DEFAULT_URL, "api_url is empty, using default");
            self.api_url = api::DEFAULT_URL.to_string();
        } else {
            self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        }

        if self.debounce_ms > validation::MAX_DEBOUNCE_MS {
            warn!(debounce_ms = self.debounce_ms, max = validation::MAX_DEBOUNCE_MS, "debounce_ms exceeds maximum, clamping");
            self.debounce_ms = validation::MAX_DEBOUNCE_MS;
        }

        if self.request_timeout_secs < validation::MIN_TIMEOUT_SECS {
            warn!(request_timeout_secs = self.request_timeout_secs, min = validation::MIN_TIMEOUT_SECS, "request_timeout_secs below minimum, clamping");
            self.request_timeout_secs = validation::MIN_TIMEOUT_SECS;
        } else if self.request_timeout_secs > validation::MAX_TIMEOUT_SECS {
            warn!(request_timeout_secs = self.request_timeout_secs, max = validation::MAX_TIMEOUT_SECS, "request_timeout_secs exceeds maximum, clamping");
            self.request_timeout_secs = validation::MAX_TIMEOUT_SECS;
        }
    }
}
