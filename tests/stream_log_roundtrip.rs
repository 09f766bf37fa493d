// tests/stream_log_roundtrip.rs
use chrono::Utc;
use market_stream_ingest::batch::{process_batch, Dataset, LocalDirStore, StreamBatch};
use market_stream_ingest::ingest::{normalize_news, HighWaterMarks};
use market_stream_ingest::sink::file::read_stream_log;
use market_stream_ingest::sink::{publish, JsonlFileSink};
use serde_json::json;
use std::io::Write;

#[tokio::test]
async fn news_flows_from_file_log_to_partitioned_object() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("streams/news.jsonl");
    let sink = JsonlFileSink::new(&log);

    let mut marks = HighWaterMarks::new();
    let raw = json!([
        {"id": 2, "datetime": 1_700_000_100, "headline": "second"},
        {"id": 1, "datetime": 1_700_000_000, "headline": "first"}
    ]);
    for article in normalize_news(Utc::now(), &raw, "AAPL", &mut marks) {
        assert!(publish(&sink, &article.symbol, &article).await);
    }

    // A torn line in the log must not sink the batch.
    let mut f = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
    writeln!(f, "not-json").unwrap();
    drop(f);

    let records = read_stream_log(&log).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records[2].data.is_none());

    let objects = dir.path().join("objects");
    let store = LocalDirStore::new(&objects);
    let outcome = process_batch(
        Utc::now(),
        Dataset::CompanyNews,
        "it",
        &StreamBatch::from_records(records),
        &store,
    )
    .await
    .unwrap();

    assert_eq!(outcome.written, 2);
    assert_eq!(outcome.skipped, 1);
    let body = std::fs::read_to_string(objects.join(outcome.key.unwrap())).unwrap();
    let heads: Vec<String> = body
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["headline"].to_string())
        .collect();
    assert_eq!(heads, vec!["\"first\"", "\"second\""]);
}
