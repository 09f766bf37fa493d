// src/ingest/providers/finnhub.rs
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::ingest::json_kind;
use crate::ingest::quotes::is_usable_quote;
use crate::ingest::types::{DateRange, NewsSource, QuoteSource};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Thin Finnhub REST client. Errors never include the request URL, since
/// the API token travels as a query parameter.
#[derive(Clone)]
pub struct FinnhubClient {
    base_url: String,
    api_key: String,
    client: Client,
    news_timeout: Duration,
    quote_timeout: Duration,
}

impl FinnhubClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
            news_timeout: Duration::from_secs(20),
            quote_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeouts(mut self, news_secs: u64, quote_secs: u64) -> Self {
        self.news_timeout = Duration::from_secs(news_secs);
        self.quote_timeout = Duration::from_secs(quote_secs);
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value> {
        if self.api_key.is_empty() {
            bail!("finnhub api key is not set");
        }

        let t0 = Instant::now();
        let result = self.request_json(path, params, timeout).await;
        record_fetch_time(path, t0.elapsed(), result.is_ok());
        result
    }

    async fn request_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value> {
        let resp = self
            .client
            .get(self.endpoint(path))
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .timeout(timeout)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("finnhub {path} request"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(http_error_message(path, status, &body));
        }

        resp.json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("decoding finnhub {path} json"))
    }
}

fn record_fetch_time(path: &str, elapsed: Duration, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    histogram!("ingest_fetch_ms", "endpoint" => path.to_string(), "status" => status)
        .record(elapsed.as_secs_f64() * 1_000.0);
}

#[async_trait]
impl NewsSource for FinnhubClient {
    async fn company_news(&self, symbol: &str, range: &DateRange) -> Result<Value> {
        tracing::debug!(symbol, from = %range.from, to = %range.to, "fetching company news");
        let body = self
            .get_json(
                "company-news",
                &[
                    ("symbol", symbol),
                    ("from", range.from.as_str()),
                    ("to", range.to.as_str()),
                ],
                self.news_timeout,
            )
            .await?;
        Ok(news_body_or_empty(symbol, range, body))
    }

    fn name(&self) -> &'static str {
        "finnhub"
    }
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    async fn quote(&self, symbol: &str) -> Result<Option<Value>> {
        let body = self
            .get_json("quote", &[("symbol", symbol)], self.quote_timeout)
            .await?;
        Ok(usable_quote_or_none(symbol, body))
    }

    fn name(&self) -> &'static str {
        "finnhub"
    }
}

/// A successful response that is not a list counts as "no news", not as a failure.
pub fn news_body_or_empty(symbol: &str, range: &DateRange, body: Value) -> Value {
    match body {
        Value::Array(items) => {
            tracing::info!(
                symbol,
                count = items.len(),
                from = %range.from,
                to = %range.to,
                "fetched company news"
            );
            Value::Array(items)
        }
        other => {
            tracing::warn!(
                symbol,
                kind = json_kind(&other),
                body = %snippet(&other.to_string(), 200),
                "unexpected company news format, expected a list"
            );
            Value::Array(Vec::new())
        }
    }
}

pub fn usable_quote_or_none(symbol: &str, body: Value) -> Option<Value> {
    if is_usable_quote(&body) {
        tracing::info!(symbol, price = ?body.get("c"), "fetched quote");
        Some(body)
    } else {
        tracing::warn!(symbol, body = %snippet(&body.to_string(), 200), "no valid price data in quote");
        None
    }
}

fn http_error_message(path: &str, status: StatusCode, body: &str) -> String {
    format!("finnhub {path} returned {status}: {}", snippet(body, 200))
}

fn snippet(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::DebuggingRecorder;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange {
            from: "2024-05-01".into(),
            to: "2024-05-03".into(),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = FinnhubClient::new("https://finnhub.io/api/v1/", "k");
        assert_eq!(c.endpoint("quote"), "https://finnhub.io/api/v1/quote");
        assert_eq!(c.endpoint("/company-news"), "https://finnhub.io/api/v1/company-news");
    }

    #[test]
    fn non_list_news_body_becomes_empty() {
        let out = news_body_or_empty("AAPL", &range(), json!({"error": "limit"}));
        assert_eq!(out, json!([]));
        let out = news_body_or_empty("AAPL", &range(), json!([{"id": 1}]));
        assert_eq!(out, json!([{"id": 1}]));
    }

    #[test]
    fn quote_without_price_is_none() {
        assert!(usable_quote_or_none("AAPL", json!({"c": null, "t": 0})).is_none());
        assert!(usable_quote_or_none("AAPL", json!({"c": 189.5, "t": 1})).is_some());
    }

    #[test]
    fn http_error_body_is_truncated() {
        let msg = http_error_message("quote", StatusCode::TOO_MANY_REQUESTS, &"x".repeat(500));
        assert!(msg.starts_with("finnhub quote returned 429 Too Many Requests: "));
        assert!(msg.len() < 300);
    }

    #[test]
    fn timeouts_are_configurable() {
        let c = FinnhubClient::new(DEFAULT_BASE_URL, "k").with_timeouts(3, 1);
        assert_eq!(c.news_timeout, Duration::from_secs(3));
        assert_eq!(c.quote_timeout, Duration::from_secs(1));
    }

    #[test]
    fn failed_fetch_is_still_timed() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            // Nothing listens on port 1, so the connect is refused.
            let c = FinnhubClient::new("http://127.0.0.1:1", "k").with_timeouts(2, 2);
            assert!(rt.block_on(c.quote("AAPL")).is_err());
        });

        let timed: Vec<_> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(k, _, _, _)| k.key().name() == "ingest_fetch_ms")
            .map(|(k, _, _, _)| {
                k.key()
                    .labels()
                    .map(|l| format!("{}={}", l.key(), l.value()))
                    .collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(timed, vec![vec!["endpoint=quote".to_string(), "status=error".to_string()]]);
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let c = FinnhubClient::new(DEFAULT_BASE_URL, "");
        let err = c.company_news("AAPL", &range()).await.unwrap_err();
        assert!(err.to_string().contains("api key"));
    }
}
