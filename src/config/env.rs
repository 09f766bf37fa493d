// src/config/env.rs
//! Secrets and deployment targets that only ever come from the environment
//! (or a local `.env`), never from the pipeline config file.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::sink::StreamTarget;

pub const ENV_FINNHUB_API_KEY: &str = "FINNHUB_API_KEY";
pub const ENV_NEWS_STREAM_TARGET: &str = "NEWS_STREAM_TARGET";
pub const ENV_QUOTES_STREAM_TARGET: &str = "QUOTES_STREAM_TARGET";
pub const ENV_OBJECT_STORE_DIR: &str = "OBJECT_STORE_DIR";
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct ProducerEnv {
    pub api_key: String,
    pub news_target: Option<StreamTarget>,
    pub quotes_target: StreamTarget,
}

impl ProducerEnv {
    /// `need_news` makes `NEWS_STREAM_TARGET` mandatory.
    pub fn from_env(need_news: bool) -> Result<Self> {
        let api_key = non_empty_var(ENV_FINNHUB_API_KEY)
            .ok_or_else(|| anyhow!("{ENV_FINNHUB_API_KEY} is not set"))?;

        let news_target = non_empty_var(ENV_NEWS_STREAM_TARGET).map(|s| StreamTarget::parse(&s));
        if need_news && news_target.is_none() {
            return Err(anyhow!("{ENV_NEWS_STREAM_TARGET} is not set"));
        }

        let quotes_target = non_empty_var(ENV_QUOTES_STREAM_TARGET)
            .map(|s| StreamTarget::parse(&s))
            .unwrap_or(StreamTarget::Stdout);

        Ok(Self {
            api_key,
            news_target,
            quotes_target,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BatchEnv {
    pub object_store_dir: PathBuf,
    pub batch_size: usize,
}

impl BatchEnv {
    pub fn from_env() -> Result<Self> {
        let object_store_dir = non_empty_var(ENV_OBJECT_STORE_DIR)
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("{ENV_OBJECT_STORE_DIR} is not set"))?;
        let batch_size = non_empty_var(ENV_BATCH_SIZE)
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        Ok(Self {
            object_store_dir,
            batch_size,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
