// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical news record handed to the stream, one per accepted article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedArticle {
    pub symbol: String,
    pub news_id: Option<i128>, // None when upstream id was missing/invalid
    #[serde(rename = "fetch_timestamp_utc")]
    pub fetch_timestamp: String, // same for every article of one call
    pub article_published_unix: Option<i64>,
    pub article_published_utc: Option<String>,
    pub category: Option<String>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedQuote {
    pub symbol: String,
    pub fetch_timestamp_utc: String,
    pub quote_timestamp_unix: Option<i64>,
    pub quote_timestamp_utc: Option<String>,
    pub current_price: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub high_price_day: Option<f64>,
    pub low_price_day: Option<f64>,
    pub open_price_day: Option<f64>,
    pub previous_close_price: Option<f64>,
}

/// Inclusive `YYYY-MM-DD` window passed to the company-news endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

/// Fetch collaborator for company news. `Err` is the fetch failure signal;
/// `Ok` carries the raw, untrusted JSON body.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn company_news(&self, symbol: &str, range: &DateRange) -> Result<Value>;
    fn name(&self) -> &'static str;
}

/// Fetch collaborator for quotes. `Ok(None)` means the body carried no usable price.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Option<Value>>;
    fn name(&self) -> &'static str;
}
