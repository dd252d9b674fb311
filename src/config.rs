//! Fetcher configuration.
//!
//! The embedding application usually builds a [`FetcherConfig`] in code, but
//! the same settings can come from the display module's TOML block through
//! [`NewsfeedConfig`]. All fields use `#[serde(default)]` so any subset of
//! keys can be specified.

use std::path::Path;
use std::time::Duration;

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::schedule::MIN_RELOAD_INTERVAL_MS;

/// Default reload interval: five minutes.
pub const DEFAULT_RELOAD_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Settings for a single [`Fetcher`](crate::Fetcher).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Endpoint returning the item list.
    pub url: String,

    /// Delay between cycles in milliseconds. Values below 1000 are raised to 1000.
    #[serde(alias = "reloadInterval")]
    pub reload_interval_ms: u64,

    /// Text encoding label for feed documents (e.g. `"UTF-8"`, `"ISO-8859-1"`).
    pub encoding: String,

    /// Log a warning for every item that is missing expected fields.
    #[serde(alias = "logFeedWarnings")]
    pub log_feed_warnings: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reload_interval_ms: DEFAULT_RELOAD_INTERVAL_MS,
            encoding: "UTF-8".to_string(),
            log_feed_warnings: false,
        }
    }
}

impl FetcherConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Reload interval after the floor has been applied.
    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms.max(MIN_RELOAD_INTERVAL_MS))
    }

    /// Resolve the configured encoding label.
    pub fn text_encoding(&self) -> Result<&'static Encoding, ConfigError> {
        resolve_encoding(&self.encoding)
    }
}

pub(crate) fn resolve_encoding(label: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))
}

/// One entry of the `feeds` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Label shown next to items from this feed.
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// The newsfeed display module's configuration block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NewsfeedConfig {
    pub feeds: Vec<FeedConfig>,
    #[serde(alias = "reloadInterval")]
    pub reload_interval_ms: u64,
    #[serde(alias = "logFeedWarnings")]
    pub log_feed_warnings: bool,
    #[serde(alias = "showSourceTitle")]
    pub show_source_title: bool,
    #[serde(alias = "showPublishDate")]
    pub show_publish_date: bool,
}

impl Default for NewsfeedConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            reload_interval_ms: DEFAULT_RELOAD_INTERVAL_MS,
            log_feed_warnings: false,
            show_source_title: true,
            show_publish_date: true,
        }
    }
}

impl NewsfeedConfig {
    /// Parse a TOML document. An empty document yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: NewsfeedConfig = toml::from_str(content)?;
        for feed in &config.feeds {
            if let Some(label) = &feed.encoding {
                resolve_encoding(label)?;
            }
        }
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), feeds = config.feeds.len(), "Loaded newsfeed configuration");
        Ok(config)
    }

    /// One fetcher configuration per feed entry.
    pub fn fetcher_configs(&self) -> Vec<FetcherConfig> {
        self.feeds
            .iter()
            .map(|feed| FetcherConfig {
                url: feed.url.clone(),
                reload_interval_ms: self.reload_interval_ms,
                encoding: feed.encoding.clone().unwrap_or_else(|| "UTF-8".to_string()),
                log_feed_warnings: self.log_feed_warnings,
            })
            .collect()
    }
}
