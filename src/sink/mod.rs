// src/sink/mod.rs
//! Publish side of the producers: the append log that normalized records go to.
//!
//! Every record travels as a [`StreamRecord`]: the partition key (the ticker)
//! plus the base64-encoded JSON payload. The batch processor reads the same
//! envelope back.

pub mod file;
pub mod http;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use metrics::counter;
use serde::{Deserialize, Serialize};

pub use file::JsonlFileSink;
pub use http::HttpStreamSink;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamRecord {
    #[serde(rename = "partitionKey", default)]
    pub partition_key: String,
    /// Base64 of the UTF-8 JSON record. Optional on read so malformed
    /// envelopes can be skipped instead of failing a whole batch.
    #[serde(default)]
    pub data: Option<String>,
}

impl StreamRecord {
    pub fn encode(partition_key: &str, payload: &[u8]) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            data: Some(STANDARD.encode(payload)),
        }
    }
}

#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one serialized record under `partition_key`.
    async fn put(&self, partition_key: &str, payload: &[u8]) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Serialize `record` and hand it to the sink. Failures are logged and
/// counted, never propagated: one lost record must not stop a cycle.
pub async fn publish<T: Serialize + ?Sized>(
    sink: &dyn RecordSink,
    partition_key: &str,
    record: &T,
) -> bool {
    let result: Result<()> = async {
        let payload = serde_json::to_vec(record).context("serializing record")?;
        sink.put(partition_key, &payload).await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = ?e, sink = sink.name(), partition_key, "failed to publish record");
            counter!("ingest_publish_errors_total").increment(1);
            false
        }
    }
}

/// Where a producer sends its records, parsed from an env value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    Stdout,
    Http(String),
    File(PathBuf),
}

impl StreamTarget {
    /// `stdout`, an `http(s)://` gateway URL, or anything else as a file path.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("stdout") || s == "-" {
            StreamTarget::Stdout
        } else if s.starts_with("http://") || s.starts_with("https://") {
            StreamTarget::Http(s.to_string())
        } else {
            StreamTarget::File(PathBuf::from(s))
        }
    }

    pub fn build(&self) -> Arc<dyn RecordSink> {
        match self {
            StreamTarget::Stdout => Arc::new(StdoutSink),
            StreamTarget::Http(url) => Arc::new(HttpStreamSink::new(url.clone())),
            StreamTarget::File(path) => Arc::new(JsonlFileSink::new(path.clone())),
        }
    }
}

/// Prints each record as pretty JSON. Handy while wiring a new stream.
pub struct StdoutSink;

#[async_trait::async_trait]
impl RecordSink for StdoutSink {
    async fn put(&self, _partition_key: &str, payload: &[u8]) -> Result<()> {
        let v: serde_json::Value = serde_json::from_slice(payload).context("stdout sink payload")?;
        println!("{}", serde_json::to_string_pretty(&v)?);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// In-memory sink; can be told to fail to exercise error paths.
#[derive(Default)]
pub struct MemorySink {
    pub records: Mutex<Vec<StreamRecord>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Decoded JSON payloads in publish order.
    pub fn payloads(&self) -> Vec<serde_json::Value> {
        let records = self.records.lock().expect("memory sink mutex poisoned");
        records
            .iter()
            .filter_map(|r| r.data.as_deref())
            .filter_map(|d| STANDARD.decode(d).ok())
            .filter_map(|b| serde_json::from_slice(&b).ok())
            .collect()
    }
}

#[async_trait::async_trait]
impl RecordSink for MemorySink {
    async fn put(&self, partition_key: &str, payload: &[u8]) -> Result<()> {
        if self.fail {
            anyhow::bail!("memory sink configured to fail");
        }
        self.records
            .lock()
            .expect("memory sink mutex poisoned")
            .push(StreamRecord::encode(partition_key, payload));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
