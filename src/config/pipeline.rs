// src/config/pipeline.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::providers::finnhub::DEFAULT_BASE_URL;

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/pipeline.toml";
pub const DEFAULT_JSON_PATH: &str = "config/pipeline.json";

fn default_symbols() -> Vec<String> {
    ["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_heartbeat_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSchedule {
    pub interval_secs: u64,
    /// Days back from today covered by each company-news request.
    pub lookback_days: u32,
    pub inter_symbol_pause_secs: u64,
    /// Sleep used when a cycle overruns `interval_secs`.
    pub overrun_sleep_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for NewsSchedule {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
            lookback_days: 2,
            inter_symbol_pause_secs: 5,
            overrun_sleep_secs: 10,
            request_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteSchedule {
    pub interval_secs: u64,
    pub inter_symbol_pause_secs: u64,
    pub overrun_sleep_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for QuoteSchedule {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            inter_symbol_pause_secs: 2,
            overrun_sleep_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// `host:port` for the Prometheus exporter; disabled when absent.
    #[serde(default)]
    pub metrics_addr: Option<String>,
    #[serde(default)]
    pub news: NewsSchedule,
    #[serde(default)]
    pub quotes: QuoteSchedule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            api_base_url: default_base_url(),
            heartbeat_secs: default_heartbeat_secs(),
            metrics_addr: None,
            news: NewsSchedule::default(),
            quotes: QuoteSchedule::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing {}", path.display()))?;
        cfg.sanitized()
    }

    /// Load using env var + fallbacks:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PIPELINE_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Self::default().sanitized()
    }

    /// Trim/upper-case/de-dup symbols (first occurrence wins) and reject
    /// configs that cannot drive a producer.
    pub fn sanitized(mut self) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        self.symbols = self
            .symbols
            .into_iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if self.symbols.is_empty() {
            bail!("config error: symbols is empty");
        }

        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            bail!("config error: api_base_url is empty");
        }

        if self.heartbeat_secs == 0 {
            self.heartbeat_secs = default_heartbeat_secs();
        }
        if self.news.request_timeout_secs == 0 {
            self.news.request_timeout_secs = NewsSchedule::default().request_timeout_secs;
        }
        if self.quotes.request_timeout_secs == 0 {
            self.quotes.request_timeout_secs = QuoteSchedule::default().request_timeout_secs;
        }
        Ok(self)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    if hint_ext == "toml" {
        return Ok(toml::from_str(s)?);
    }
    // Unknown extension: JSON first, then TOML.
    serde_json::from_str(s)
        .map_err(anyhow::Error::from)
        .or_else(|_| toml::from_str(s).map_err(anyhow::Error::from))
        .map_err(|_| anyhow!("unsupported pipeline config format"))
}
