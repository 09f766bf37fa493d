// src/batch/mod.rs
//! Downstream consumer: turns a batch of stream records into one JSON-Lines
//! object under an hour-partitioned key.
//!
//! Bad records are logged and skipped. A failed object write fails the whole
//! batch so the caller can hand it back to the stream for another attempt.

pub mod store;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::sink::StreamRecord;

pub use store::{LocalDirStore, MemoryStore, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    CompanyNews,
    StockQuotes,
}

impl Dataset {
    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::CompanyNews => "company_news",
            Dataset::StockQuotes => "stock_quotes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "company_news" | "news" => Some(Dataset::CompanyNews),
            "stock_quotes" | "quotes" => Some(Dataset::StockQuotes),
            _ => None,
        }
    }
}

/// Batch as delivered by the stream: `{"Records": [{"kinesis": {...}}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<BatchEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchEntry {
    #[serde(default)]
    pub kinesis: Option<StreamRecord>,
}

impl StreamBatch {
    pub fn from_records(records: impl IntoIterator<Item = StreamRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| BatchEntry { kinesis: Some(r) })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub written: usize,
    pub skipped: usize,
    /// Object key, `None` when nothing in the batch was usable.
    pub key: Option<String>,
}

/// `processed/<dataset>/year=YYYY/month=MM/day=DD/hour=HH/<dataset>_<ts>_<request_id>.jsonl`
pub fn object_key(now: DateTime<Utc>, dataset: Dataset, request_id: &str) -> String {
    let d = dataset.as_str();
    format!(
        "processed/{d}/{}{d}_{}_{request_id}.jsonl",
        now.format("year=%Y/month=%m/day=%d/hour=%H/"),
        now.format("%Y-%m-%d-%H-%M-%S"),
    )
}

/// Base64 → UTF-8 → JSON.
pub fn decode_payload(data: &str) -> Result<Value> {
    let bytes = STANDARD.decode(data.trim()).context("payload is not valid base64")?;
    let text = String::from_utf8(bytes).context("payload is not valid utf-8")?;
    serde_json::from_str(&text).with_context(|| {
        format!(
            "could not parse record payload (first 100 chars): '{}'",
            text.chars().take(100).collect::<String>()
        )
    })
}

pub async fn process_batch(
    now: DateTime<Utc>,
    dataset: Dataset,
    request_id: &str,
    batch: &StreamBatch,
    store: &dyn ObjectStore,
) -> Result<BatchOutcome> {
    info!(dataset = dataset.as_str(), records = batch.records.len(), "processing stream batch");

    let mut body = String::new();
    let mut written = 0usize;
    let mut skipped = 0usize;

    for entry in &batch.records {
        let Some(data) = entry.kinesis.as_ref().and_then(|k| k.data.as_deref()) else {
            warn!("skipping record with no kinesis.data payload");
            skipped += 1;
            continue;
        };
        match decode_payload(data) {
            Ok(record) => {
                body.push_str(&record.to_string());
                body.push('\n');
                written += 1;
            }
            Err(e) => {
                error!(error = ?e, "skipping undecodable record");
                skipped += 1;
            }
        }
    }

    counter!("batch_records_skipped_total", "dataset" => dataset.as_str()).increment(skipped as u64);

    if written == 0 {
        info!(dataset = dataset.as_str(), "no valid records in this batch to write");
        return Ok(BatchOutcome {
            written,
            skipped,
            key: None,
        });
    }

    let key = object_key(now, dataset, request_id);
    info!(records = written, store = store.name(), %key, "writing batch object");
    if let Err(e) = store.put(&key, body.into_bytes()).await {
        error!(error = ?e, %key, "object write failed, batch must be retried");
        return Err(e.context(format!("writing batch object {key}")));
    }

    counter!("batch_records_written_total", "dataset" => dataset.as_str()).increment(written as u64);
    Ok(BatchOutcome {
        written,
        skipped,
        key: Some(key),
    })
}
