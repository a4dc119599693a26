//! Configuration file parser for ~/.config/feedpane/config.toml.
//!
//! The config file is optional; a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted by serde but logged as
//! likely typos.
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::controller::ControllerConfig;
use crate::storage::MAX_ARTICLES;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Articles per page of the article list.
    pub page_size: usize,

    /// Row ceiling for filtered views and search, which are sliced locally.
    pub filter_fetch_cap: usize,

    /// Rows left below the viewport before the next page is requested.
    pub scroll_threshold_rows: usize,

    /// Minimum gap between two scroll observations.
    pub scroll_interval_ms: u64,

    /// How often the store is polled for updated feeds. 0 disables polling.
    pub feed_poll_seconds: u64,

    /// Whether Enter on an article marks it read.
    pub mark_read_on_open: bool,

    /// chrono format string for article timestamps.
    pub date_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 20,
            filter_fetch_cap: 1000,
            scroll_threshold_rows: 5,
            scroll_interval_ms: 200,
            feed_poll_seconds: 30,
            mark_read_on_open: true,
            date_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

const KNOWN_KEYS: [&str; 7] = [
    "page_size",
    "filter_fetch_cap",
    "scroll_threshold_rows",
    "scroll_interval_ms",
    "feed_poll_seconds",
    "mark_read_on_open",
    "date_format",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Zero sizes → clamped to their defaults, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        config.clamp();
        tracing::info!(
            path = %path.display(),
            page_size = config.page_size,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn clamp(&mut self) {
        let defaults = Self::default();
        if self.page_size == 0 {
            tracing::warn!(default = defaults.page_size, "page_size must be positive, using default");
            self.page_size = defaults.page_size;
        }
        if self.filter_fetch_cap == 0 {
            tracing::warn!(
                default = defaults.filter_fetch_cap,
                "filter_fetch_cap must be positive, using default"
            );
            self.filter_fetch_cap = defaults.filter_fetch_cap;
        }
        if self.filter_fetch_cap > MAX_ARTICLES {
            tracing::warn!(
                configured = self.filter_fetch_cap,
                max = MAX_ARTICLES,
                "filter_fetch_cap exceeds the per-query row limit, capping"
            );
            self.filter_fetch_cap = MAX_ARTICLES;
        }
        if self.scroll_threshold_rows == 0 {
            tracing::warn!(
                default = defaults.scroll_threshold_rows,
                "scroll_threshold_rows must be positive, using default"
            );
            self.scroll_threshold_rows = defaults.scroll_threshold_rows;
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            tracing::warn!(
                date_format = %self.date_format,
                default = %defaults.date_format,
                "date_format is not a valid strftime pattern, using default"
            );
            self.date_format = defaults.date_format;
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            page_size: self.page_size,
            fetch_cap: self.filter_fetch_cap,
            scroll_threshold_rows: self.scroll_threshold_rows,
            scroll_interval: Duration::from_millis(self.scroll_interval_ms),
            date_format: self.date_format.clone(),
        }
    }

    /// `None` when polling is disabled
    pub fn feed_poll_interval(&self) -> Option<Duration> {
        (self.feed_poll_seconds > 0).then(|| Duration::from_secs(self.feed_poll_seconds))
    }
}

// ============================================================================
// Tests
// ============================================================================
