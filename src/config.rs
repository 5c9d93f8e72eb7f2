//! Configuration management for QuoteCore.
//!
//! This module handles loading and saving application configuration to/from
//! a JSON file. The config directory can be customized.
//!
//! Includes remote sync configuration:
//! - base_url: REST endpoint serving `/posts`
//! - sync_interval_secs: period of the background resync
//! - mapping: how remote posts turn into quotes

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, QuoteResult};

/// How a remote post is mapped onto a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteMapping {
    /// `title` becomes the text, category is fixed to "Server"
    #[default]
    TitleOnly,
    /// `title` becomes the category, `body` becomes the text
    TitleAsCategory,
}

impl RemoteMapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteMapping::TitleOnly => "title_only",
            RemoteMapping::TitleAsCategory => "title_as_category",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "title_only" => Some(RemoteMapping::TitleOnly),
            "title_as_category" => Some(RemoteMapping::TitleAsCategory),
            _ => None,
        }
    }
}

/// Remote sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_enabled")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Number of posts requested per fetch
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub mapping: RemoteMapping,
    /// Post local quotes back to the remote after each merge
    #[serde(default = "default_push_local")]
    pub push_local: bool,
}

fn default_remote_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    "https://jsonplaceholder.typicode.com".to_string()
}

fn default_fetch_limit() -> u32 {
    5
}

fn default_sync_interval_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_push_local() -> bool {
    true
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_remote_enabled(),
            base_url: default_base_url(),
            fetch_limit: default_fetch_limit(),
            sync_interval_secs: default_sync_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            mapping: RemoteMapping::default(),
            push_local: default_push_local(),
        }
    }
}

impl RemoteConfig {
    /// Replace zero durations (hand-edited files) with the defaults
    fn sanitize(&mut self) {
        if self.sync_interval_secs == 0 {
            tracing::warn!(
                "sync_interval_secs must be greater than zero, using {}",
                default_sync_interval_secs()
            );
            self.sync_interval_secs = default_sync_interval_secs();
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!(
                "request_timeout_secs must be greater than zero, using {}",
                default_request_timeout_secs()
            );
            self.request_timeout_secs = default_request_timeout_secs();
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigData {
    /// Path to the SQLite key-value store
    #[serde(default)]
    pub database_file: String,
    /// Remote sync configuration
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Configuration manager
pub struct Config {
    config_dir: PathBuf,
    config_file: PathBuf,
    data: ConfigData,
}

impl Config {
    /// Create a new configuration manager
    ///
    /// Without the `desktop` feature, `config_dir` is required.
    pub fn new(config_dir: Option<PathBuf>) -> QuoteResult<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => {
                #[cfg(feature = "desktop")]
                {
                    dirs::config_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join("quotecore")
                }
                #[cfg(not(feature = "desktop"))]
                {
                    return Err(QuoteError::Config(
                        "config_dir is required without the desktop feature".to_string(),
                    ));
                }
            }
        };

        fs::create_dir_all(&config_dir)?;
        let config_file = config_dir.join("config.json");

        let mut data = if config_file.exists() {
            match fs::read_to_string(&config_file) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!("Ignoring unreadable config {:?}: {}", config_file, e);
                    ConfigData::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config {:?}: {}", config_file, e);
                    ConfigData::default()
                }
            }
        } else {
            ConfigData::default()
        };

        data.remote.sanitize();

        if data.database_file.is_empty() {
            data.database_file = config_dir.join("quotes.db").to_string_lossy().to_string();
        }

        let config = Self {
            config_dir,
            config_file,
            data,
        };

        // Save default config if it doesn't exist
        if !config.config_file.exists() {
            config.save()?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> QuoteResult<()> {
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    /// Get the configuration directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the database file path
    pub fn database_file(&self) -> &str {
        &self.data.database_file
    }

    /// Get remote sync configuration
    pub fn remote(&self) -> &RemoteConfig {
        &self.data.remote
    }

    /// Check if remote sync is enabled
    pub fn is_remote_enabled(&self) -> bool {
        self.data.remote.enabled
    }

    /// Enable or disable remote sync
    pub fn set_remote_enabled(&mut self, enabled: bool) -> QuoteResult<()> {
        self.data.remote.enabled = enabled;
        self.save()
    }

    /// Period of the background resync
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.data.remote.sync_interval_secs)
    }

    pub fn set_sync_interval_secs(&mut self, secs: u64) -> QuoteResult<()> {
        if secs == 0 {
            return Err(QuoteError::validation(
                "sync_interval_secs",
                "must be greater than zero",
            ));
        }
        self.data.remote.sync_interval_secs = secs;
        self.save()
    }

    pub fn set_base_url(&mut self, url: &str) -> QuoteResult<()> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(QuoteError::validation(
                "base_url",
                "must start with http:// or https://",
            ));
        }
        self.data.remote.base_url = url.trim_end_matches('/').to_string();
        self.save()
    }

    pub fn set_mapping(&mut self, mapping: RemoteMapping) -> QuoteResult<()> {
        self.data.remote.mapping = mapping;
        self.save()
    }

    /// Get a configuration value
    pub fn get(&self, key: &str) -> Option<String> {
        let remote = &self.data.remote;
        match key {
            "database_file" => Some(self.data.database_file.clone()),
            "remote.enabled" => Some(remote.enabled.to_string()),
            "remote.base_url" => Some(remote.base_url.clone()),
            "remote.fetch_limit" => Some(remote.fetch_limit.to_string()),
            "remote.sync_interval_secs" => Some(remote.sync_interval_secs.to_string()),
            "remote.request_timeout_secs" => Some(remote.request_timeout_secs.to_string()),
            "remote.mapping" => Some(remote.mapping.as_str().to_string()),
            "remote.push_local" => Some(remote.push_local.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value
    pub fn set(&mut self, key: &str, value: &str) -> QuoteResult<()> {
        match key {
            "database_file" => self.data.database_file = value.to_string(),
            "remote.enabled" => self.data.remote.enabled = parse_value(key, value)?,
            "remote.base_url" => return self.set_base_url(value),
            "remote.fetch_limit" => self.data.remote.fetch_limit = parse_value(key, value)?,
            "remote.sync_interval_secs" => {
                return self.set_sync_interval_secs(parse_value(key, value)?)
            }
            "remote.request_timeout_secs" => {
                let secs: u64 = parse_value(key, value)?;
                if secs == 0 {
                    return Err(QuoteError::validation(key, "must be greater than zero"));
                }
                self.data.remote.request_timeout_secs = secs;
            }
            "remote.mapping" => {
                let mapping = RemoteMapping::parse(value).ok_or_else(|| {
                    QuoteError::validation(key, "expected title_only or title_as_category")
                })?;
                self.data.remote.mapping = mapping;
            }
            "remote.push_local" => self.data.remote.push_local = parse_value(key, value)?,
            _ => return Err(QuoteError::Config(format!("Unknown config key: {}", key))),
        }
        self.save()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> QuoteResult<T> {
    value
        .parse()
        .map_err(|_| QuoteError::validation(key, format!("invalid value '{}'", value)))
}
