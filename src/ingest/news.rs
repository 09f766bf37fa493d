// src/ingest/news.rs
//! Ordered, de-duplicating normalization of company-news batches.
//!
//! Each symbol keeps a high-water-mark: the greatest article id accepted so
//! far. A batch is sorted oldest-first by `(datetime, id)`, articles whose id
//! is at or below the mark read at the start of the call are dropped, and the
//! mark is raised once, after the whole batch has been evaluated.
//!
//! Articles without a usable integer id cannot be de-duplicated. They are
//! emitted on every call that sees them and never move the mark.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::ingest::types::NormalizedArticle;
use crate::ingest::{coerce_unix_seconds, fetch_timestamp, iso_utc_from_unix, json_kind};

/// Per-symbol high-water-marks. Lives for the whole process; nothing persists it.
#[derive(Debug, Clone, Default)]
pub struct HighWaterMarks {
    inner: HashMap<String, i128>,
}

impl HighWaterMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mark for `symbol`; untracked symbols read as 0.
    pub fn get(&self, symbol: &str) -> i128 {
        self.inner.get(symbol).copied().unwrap_or(0)
    }

    /// Raise the mark to `candidate`. Returns false (and changes nothing)
    /// when `candidate` is not above the current mark.
    pub fn advance(&mut self, symbol: &str, candidate: i128) -> bool {
        if candidate <= self.get(symbol) {
            return false;
        }
        self.inner.insert(symbol.to_string(), candidate);
        true
    }
}

/// Normalize one raw company-news body for `symbol`.
///
/// `raw` is the untrusted JSON returned by the fetch collaborator. Anything
/// other than an array yields an empty result and leaves `marks` untouched.
/// `now` becomes the `fetch_timestamp` of every emitted article.
pub fn normalize_news(
    now: DateTime<Utc>,
    raw: &Value,
    symbol: &str,
    marks: &mut HighWaterMarks,
) -> Vec<NormalizedArticle> {
    let Some(articles) = raw.as_array() else {
        warn!(symbol, kind = json_kind(raw), "news body is not a list, ignoring");
        return Vec::new();
    };

    let fetched_at = fetch_timestamp(now);

    // sort_by_key is stable: equal keys keep upstream order.
    let mut ordered: Vec<&Value> = articles.iter().collect();
    ordered.sort_by_key(|a| sort_key(a));

    let current_max = marks.get(symbol);
    let mut batch_max = current_max;
    let mut emitted = Vec::new();

    for article in ordered {
        let Some(fields) = article.as_object() else {
            continue;
        };

        let news_id = id_field(fields);
        match news_id {
            Some(id) if id <= current_max => {
                debug!(symbol, news_id = id, last_seen = current_max, "skipping already seen article");
                continue;
            }
            Some(id) => batch_max = batch_max.max(id),
            None => {
                let headline: String = str_field(fields, "headline")
                    .unwrap_or_default()
                    .chars()
                    .take(50)
                    .collect();
                warn!(
                    symbol,
                    %headline,
                    id = ?fields.get("id"),
                    "article has missing or invalid id, emitting without de-duplication"
                );
            }
        }

        emitted.push(build_article(fields, symbol, news_id, &fetched_at));
    }

    if marks.advance(symbol, batch_max) {
        info!(symbol, last_seen = batch_max, "advanced news high-water-mark");
    }

    if !emitted.is_empty() {
        info!(symbol, new_articles = emitted.len(), "normalized new articles");
    } else if !articles.is_empty() {
        info!(symbol, last_seen = marks.get(symbol), "no new articles");
    }

    emitted
}

/// `(datetime, id)` with anything missing or non-integer treated as 0.
fn sort_key(article: &Value) -> (i64, i128) {
    match article.as_object() {
        Some(fields) => (
            fields.get("datetime").and_then(Value::as_i64).unwrap_or(0),
            id_field(fields).unwrap_or(0),
        ),
        None => (0, 0),
    }
}

fn build_article(
    fields: &Map<String, Value>,
    symbol: &str,
    news_id: Option<i128>,
    fetched_at: &str,
) -> NormalizedArticle {
    let published_raw = fields.get("datetime").filter(|v| !v.is_null());
    let published_unix = published_raw.and_then(coerce_unix_seconds);
    let published_utc = published_unix.and_then(iso_utc_from_unix);

    if published_raw.is_some() && published_utc.is_none() {
        warn!(
            symbol,
            news_id = ?news_id,
            datetime = ?published_raw,
            "could not convert article datetime"
        );
    }

    NormalizedArticle {
        symbol: symbol.to_string(),
        news_id,
        fetch_timestamp: fetched_at.to_string(),
        article_published_unix: published_unix,
        article_published_utc: published_utc,
        category: str_field(fields, "category"),
        headline: str_field(fields, "headline"),
        summary: str_field(fields, "summary"),
        source: str_field(fields, "source"),
        url: str_field(fields, "url"),
        image_url: str_field(fields, "image"),
    }
}

/// Integer `id`, covering the full signed and unsigned 64-bit JSON range.
fn id_field(fields: &Map<String, Value>) -> Option<i128> {
    let id = fields.get("id")?;
    id.as_i64()
        .map(i128::from)
        .or_else(|| id.as_u64().map(i128::from))
}

fn str_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}
