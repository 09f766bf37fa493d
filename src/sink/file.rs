// src/sink/file.rs
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{RecordSink, StreamRecord};

/// Local append log: one JSON `StreamRecord` per line.
///
/// Writes are serialized through a mutex so concurrent producers sharing a
/// sink never interleave partial lines.
pub struct JsonlFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait::async_trait]
impl RecordSink for JsonlFileSink {
    async fn put(&self, partition_key: &str, payload: &[u8]) -> Result<()> {
        let mut line = serde_json::to_vec(&StreamRecord::encode(partition_key, payload))?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening stream log {}", self.path.display()))?;
        file.write_all(&line)
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl-file"
    }
}

/// Read a JSONL stream log back. Lines that are not valid envelopes (bad
/// JSON or bad UTF-8) are kept as records without data so the batch
/// processor can count them.
pub fn read_stream_log(path: &Path) -> Result<Vec<StreamRecord>> {
    let content =
        std::fs::read(path).with_context(|| format!("reading stream log {}", path.display()))?;
    Ok(content
        .split(|b| *b == b'\n')
        .filter(|l| !l.trim_ascii().is_empty())
        .map(|l| {
            serde_json::from_slice::<StreamRecord>(l).unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(&l[..l.len().min(100)]),
                    "unreadable stream log line"
                );
                StreamRecord {
                    partition_key: String::new(),
                    data: None,
                }
            })
        })
        .collect())
}
