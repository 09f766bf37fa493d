// tests/ingest_cycle.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use market_stream_ingest::ingest::scheduler::{run_news_cycle, run_quote_cycle};
use market_stream_ingest::ingest::types::{DateRange, NewsSource, QuoteSource};
use market_stream_ingest::ingest::HighWaterMarks;
use market_stream_ingest::sink::MemorySink;
use serde_json::{json, Value};

/// Serves queued bodies per symbol; `None` in the queue means "fetch failed".
struct ScriptedNews {
    bodies: Mutex<HashMap<String, Vec<Option<Value>>>>,
}

impl ScriptedNews {
    fn new(script: &[(&str, Vec<Option<Value>>)]) -> Self {
        Self {
            bodies: Mutex::new(
                script
                    .iter()
                    .map(|(s, v)| (s.to_string(), v.clone()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl NewsSource for ScriptedNews {
    async fn company_news(&self, symbol: &str, _range: &DateRange) -> Result<Value> {
        let mut bodies = self.bodies.lock().unwrap();
        let queue = bodies.get_mut(symbol).ok_or_else(|| anyhow!("unknown symbol"))?;
        if queue.is_empty() {
            return Ok(json!([]));
        }
        queue.remove(0).ok_or_else(|| anyhow!("connection reset"))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct FixedQuotes;

#[async_trait]
impl QuoteSource for FixedQuotes {
    async fn quote(&self, symbol: &str) -> Result<Option<Value>> {
        match symbol {
            "AAPL" => Ok(Some(json!({"c": 189.5, "t": 1_700_000_000}))),
            "MSFT" => Ok(None),
            _ => Err(anyhow!("timeout")),
        }
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn range() -> DateRange {
    DateRange {
        from: "2024-05-01".into(),
        to: "2024-05-03".into(),
    }
}

fn symbols(s: &[&str]) -> Vec<String> {
    s.iter().map(|x| x.to_string()).collect()
}

#[tokio::test]
async fn second_cycle_only_publishes_new_articles() {
    let source = ScriptedNews::new(&[(
        "AAPL",
        vec![
            Some(json!([{"id": 1, "datetime": 10}, {"id": 2, "datetime": 20}])),
            Some(json!([{"id": 2, "datetime": 20}, {"id": 3, "datetime": 30}])),
        ],
    )]);
    let sink = MemorySink::new();
    let mut marks = HighWaterMarks::new();
    let syms = symbols(&["AAPL"]);

    let r1 = run_news_cycle(&source, &sink, &syms, &range(), &mut marks, Duration::ZERO).await;
    let r2 = run_news_cycle(&source, &sink, &syms, &range(), &mut marks, Duration::ZERO).await;

    assert_eq!(r1.emitted, 2);
    assert_eq!(r2.emitted, 1);
    assert_eq!(marks.get("AAPL"), 3);

    let published: Vec<_> = sink.payloads().iter().map(|p| p["news_id"].clone()).collect();
    assert_eq!(published, vec![json!(1), json!(2), json!(3)]);
    let records = sink.records.lock().unwrap();
    assert!(records.iter().all(|r| r.partition_key == "AAPL"));
}

#[tokio::test]
async fn fetch_failure_skips_symbol_and_keeps_mark() {
    let source = ScriptedNews::new(&[
        ("AAPL", vec![None]),
        ("MSFT", vec![Some(json!([{"id": 7}]))]),
    ]);
    let sink = MemorySink::new();
    let mut marks = HighWaterMarks::new();
    marks.advance("AAPL", 40);

    let report = run_news_cycle(
        &source,
        &sink,
        &symbols(&["AAPL", "MSFT"]),
        &range(),
        &mut marks,
        Duration::ZERO,
    )
    .await;

    assert_eq!(report.symbols, 2);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.emitted, 1);
    assert_eq!(marks.get("AAPL"), 40);
    assert_eq!(marks.get("MSFT"), 7);
}

#[tokio::test]
async fn publish_failure_does_not_roll_back_mark() {
    let source = ScriptedNews::new(&[("NVDA", vec![Some(json!([{"id": 11}, {"id": 12}]))])]);
    let sink = MemorySink::failing();
    let mut marks = HighWaterMarks::new();

    let report = run_news_cycle(
        &source,
        &sink,
        &symbols(&["NVDA"]),
        &range(),
        &mut marks,
        Duration::ZERO,
    )
    .await;

    assert_eq!(report.emitted, 2);
    assert_eq!(report.publish_failures, 2);
    assert_eq!(marks.get("NVDA"), 12);
}

#[tokio::test]
async fn quote_cycle_publishes_usable_quotes_only() {
    let sink = MemorySink::new();
    let report = run_quote_cycle(
        &FixedQuotes,
        &sink,
        &symbols(&["AAPL", "MSFT", "GOOGL"]),
        Duration::ZERO,
    )
    .await;

    assert_eq!(report.emitted, 1);
    assert_eq!(report.fetch_failures, 1);
    let payloads = sink.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["symbol"], "AAPL");
    assert_eq!(payloads[0]["current_price"], 189.5);
    assert_eq!(payloads[0]["quote_timestamp_utc"], "2023-11-14T22:13:20+00:00");
}
