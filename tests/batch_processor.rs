// tests/batch_processor.rs
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use market_stream_ingest::batch::{process_batch, BatchEntry, Dataset, MemoryStore, StreamBatch};
use market_stream_ingest::sink::StreamRecord;
use serde_json::json;

fn now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_717_243_509, 0).unwrap()
}

fn record(payload: &str) -> StreamRecord {
    StreamRecord::encode("AAPL", payload.as_bytes())
}

#[tokio::test]
async fn good_records_become_one_jsonl_object() {
    let batch = StreamBatch::from_records([
        record(r#"{"symbol":"AAPL","news_id":1}"#),
        record(r#"{"symbol":"AAPL","news_id":2}"#),
    ]);
    let store = MemoryStore::new();

    let outcome = process_batch(now(), Dataset::CompanyNews, "req-9", &batch, &store)
        .await
        .unwrap();

    let key = "processed/company_news/year=2024/month=06/day=01/hour=12/company_news_2024-06-01-12-05-09_req-9.jsonl";
    assert_eq!(outcome.written, 2);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.key.as_deref(), Some(key));

    let objects = store.objects.lock().unwrap();
    let body = String::from_utf8(objects[key].clone()).unwrap();
    let lines: Vec<serde_json::Value> = body
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            json!({"symbol": "AAPL", "news_id": 1}),
            json!({"symbol": "AAPL", "news_id": 2})
        ]
    );
    assert!(body.ends_with('\n'));
}

#[tokio::test]
async fn bad_records_are_skipped_not_fatal() {
    let mut batch = StreamBatch::from_records([
        record(r#"{"ok":true}"#),
        record("not json"),
        StreamRecord {
            partition_key: "AAPL".into(),
            data: Some("@@not-base64@@".into()),
        },
        StreamRecord {
            partition_key: "AAPL".into(),
            data: Some(STANDARD.encode([0xff, 0xfe])),
        },
        StreamRecord {
            partition_key: "AAPL".into(),
            data: None,
        },
    ]);
    batch.records.push(BatchEntry { kinesis: None });
    let store = MemoryStore::new();

    let outcome = process_batch(now(), Dataset::StockQuotes, "r", &batch, &store)
        .await
        .unwrap();

    assert_eq!(outcome.written, 1);
    assert_eq!(outcome.skipped, 5);
    assert!(outcome.key.unwrap().starts_with("processed/stock_quotes/year=2024/"));
}

#[tokio::test]
async fn nothing_usable_means_no_write() {
    let batch = StreamBatch::from_records([record("{{")]);
    let store = MemoryStore::new();
    let outcome = process_batch(now(), Dataset::CompanyNews, "r", &batch, &store)
        .await
        .unwrap();
    assert_eq!(outcome.key, None);
    assert!(store.objects.lock().unwrap().is_empty());

    let empty = StreamBatch::default();
    let outcome = process_batch(now(), Dataset::CompanyNews, "r", &empty, &store)
        .await
        .unwrap();
    assert_eq!(outcome.written, 0);
}

#[tokio::test]
async fn store_failure_fails_the_batch() {
    let batch = StreamBatch::from_records([record(r#"{"a":1}"#)]);
    let store = MemoryStore::failing();
    let err = process_batch(now(), Dataset::CompanyNews, "r", &batch, &store)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("memory store configured to fail"));
}

#[test]
fn batch_event_shape_deserializes() {
    let raw = json!({
        "Records": [
            {"kinesis": {"partitionKey": "AAPL", "data": "eyJ4IjoxfQ=="}},
            {"eventSource": "aws:kinesis"}
        ]
    });
    let batch: StreamBatch = serde_json::from_value(raw).unwrap();
    assert_eq!(batch.records.len(), 2);
    assert_eq!(
        batch.records[0].kinesis.as_ref().unwrap().data.as_deref(),
        Some("eyJ4IjoxfQ==")
    );
    assert!(batch.records[1].kinesis.is_none());
}
