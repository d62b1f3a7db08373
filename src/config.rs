use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Auto-pagination keeps fetching until at least this many items are held.
    #[serde(default = "default_min_items")]
    pub min_items: usize,
    /// Hard cap on pages fetched by a single settle pass.
    #[serde(default = "default_max_auto_fetches")]
    pub max_auto_fetches: usize,
    /// Items per horizontal row in the shelf view.
    #[serde(default = "default_row_width")]
    pub row_width: usize,
}

fn default_min_items() -> usize { 10 }
fn default_max_auto_fetches() -> usize { 25 }
fn default_row_width() -> usize { 4 }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            min_items: default_min_items(),
            max_auto_fetches: default_max_auto_fetches(),
            row_width: default_row_width(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Root of a browse service speaking the simplified page format (see
    /// `feed::innertube`), typically a local proxy in front of the real API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/v1".to_string()
}
fn default_timeout() -> u64 { 10_000 }
fn default_user_agent() -> String {
    "feed-accumulator/0.1".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config TOML")
    }
}
