// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod batch;
pub mod config;
pub mod ingest;
pub mod sink;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::ingest::types::{NormalizedArticle, NormalizedQuote};
pub use crate::ingest::{normalize_news, normalize_quote, HighWaterMarks};
