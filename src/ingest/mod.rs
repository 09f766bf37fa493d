// src/ingest/mod.rs
pub mod news;
pub mod providers;
pub mod quotes;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde_json::Value;

pub use news::{normalize_news, HighWaterMarks};
pub use quotes::normalize_quote;

/// ISO-8601 UTC with microseconds, used for `fetch_timestamp_utc`.
pub fn fetch_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Unix seconds to `YYYY-MM-DDTHH:MM:SS+00:00`.
/// `None` outside years 1..=9999, which ISO-8601 cannot express without extension.
pub fn iso_utc_from_unix(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .filter(|dt| (1..=9999).contains(&dt.year()))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Read a unix-seconds value from untrusted JSON.
///
/// Integers pass as-is, finite floats are truncated toward zero and numeric
/// strings are parsed. Everything else (bools, objects, overflow) is `None`.
pub fn coerce_unix_seconds(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
