//! Replays a JSONL stream log into hour-partitioned batch objects.
//!
//! Usage: `batch-processor <company_news|stock_quotes> <stream-log.jsonl>`
//! Env: `OBJECT_STORE_DIR` (required), `BATCH_SIZE` (default 100).

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use market_stream_ingest::batch::{process_batch, Dataset, LocalDirStore, StreamBatch};
use market_stream_ingest::config::BatchEnv;
use market_stream_ingest::sink::file::read_stream_log;
use market_stream_ingest::telemetry;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let dataset = args
        .next()
        .and_then(|s| Dataset::parse(&s))
        .ok_or_else(|| anyhow!("first argument must be company_news or stock_quotes"))?;
    let log_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("second argument must be the stream log path"))?;

    let env = BatchEnv::from_env()?;
    let store = LocalDirStore::new(env.object_store_dir.clone());
    let records = read_stream_log(&log_path)?;
    info!(records = records.len(), batch_size = env.batch_size, "replaying stream log");

    let mut objects = 0usize;
    for chunk in records.chunks(env.batch_size) {
        let batch = StreamBatch::from_records(chunk.iter().cloned());
        let request_id = uuid::Uuid::new_v4().to_string();
        let outcome = process_batch(Utc::now(), dataset, &request_id, &batch, &store)
            .await
            .context("batch failed; rerun to retry")?;
        if outcome.key.is_some() {
            objects += 1;
        }
    }

    info!(objects, dir = %env.object_store_dir.display(), "batch processing complete");
    Ok(())
}
