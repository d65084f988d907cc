//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via SUBREG_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("SUBREG_API_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Loopback port the OAuth redirect is delivered to.
pub const DEFAULT_CALLBACK_PORT: u16 = 9876;

pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 120;

/// Client configuration, persisted as `~/.subreg/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL every API path is joined onto.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Seconds between background list refreshes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_callback_timeout_secs() -> u64 {
    DEFAULT_CALLBACK_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the state directory, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(level) = non_empty_env("SUBREG_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty_env("SUBREG_API_URL") {
            self.api_base_url = url;
        }
    }

    fn validate(&self) -> CoreResult<()> {
        if self.poll_interval_secs == 0 {
            return Err(CoreError::Config(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        self.api_base_url().map(|_| ())
    }

    /// The API base URL, parsed. A trailing slash is added so that relative
    /// joins keep the full base path.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(CoreError::from)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
