// src/ingest/quotes.rs
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::ingest::types::NormalizedQuote;
use crate::ingest::{coerce_unix_seconds, fetch_timestamp, iso_utc_from_unix};

/// Map a raw Finnhub quote (`c`, `d`, `dp`, `h`, `l`, `o`, `pc`, `t`) to the
/// canonical record. Returns `None` when `raw` is not a JSON object.
pub fn normalize_quote(now: DateTime<Utc>, raw: &Value, symbol: &str) -> Option<NormalizedQuote> {
    let fields = raw.as_object()?;

    let ts_raw = fields.get("t").filter(|v| !v.is_null());
    let quote_timestamp_unix = ts_raw.and_then(coerce_unix_seconds);
    let quote_timestamp_utc = quote_timestamp_unix.and_then(iso_utc_from_unix);
    if ts_raw.is_some() && quote_timestamp_utc.is_none() {
        warn!(symbol, t = ?ts_raw, "could not convert quote timestamp");
    }

    Some(NormalizedQuote {
        symbol: symbol.to_string(),
        fetch_timestamp_utc: fetch_timestamp(now),
        quote_timestamp_unix,
        quote_timestamp_utc,
        current_price: num(fields, "c"),
        change: num(fields, "d"),
        percent_change: num(fields, "dp"),
        high_price_day: num(fields, "h"),
        low_price_day: num(fields, "l"),
        open_price_day: num(fields, "o"),
        previous_close_price: num(fields, "pc"),
    })
}

/// A quote body is usable only if it has both `c` and `t`, and `c` is not null.
pub fn is_usable_quote(raw: &Value) -> bool {
    raw.as_object().is_some_and(|f| {
        f.contains_key("t") && f.get("c").is_some_and(|c| !c.is_null())
    })
}

fn num(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}
