// src/telemetry.rs
//! Logging and metrics wiring shared by the binaries.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). `LOG_FORMAT=json` switches
/// to JSON lines for log shippers; anything else gives compact text.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        // Already installed (tests, or a second init from the same process).
        tracing::debug!("tracing subscriber already set");
    }
}

/// One-time metric descriptions (so series show up with help text on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_news_fetched_total", "Raw article records fetched.");
        describe_counter!(
            "ingest_news_emitted_total",
            "Articles accepted by the high-water-mark filter."
        );
        describe_counter!(
            "ingest_news_duplicates_total",
            "Articles dropped as already seen."
        );
        describe_counter!("ingest_quotes_emitted_total", "Quotes normalized.");
        describe_counter!("ingest_fetch_errors_total", "Failed upstream fetches.");
        describe_counter!("ingest_publish_errors_total", "Records the sink rejected.");
        describe_counter!(
            "batch_records_written_total",
            "Records written to batch objects."
        );
        describe_counter!(
            "batch_records_skipped_total",
            "Stream records skipped as undecodable."
        );
        describe_histogram!("ingest_fetch_ms", "Upstream fetch time in milliseconds.");
        describe_histogram!("ingest_cycle_ms", "Polling cycle duration in milliseconds.");
        describe_gauge!("ingest_last_cycle_ts", "Unix ts when a polling cycle last finished.");
        describe_gauge!("news_high_water_mark", "Greatest accepted news id per symbol.");
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must run inside a tokio runtime.
pub fn install_prometheus(addr: &str) -> Result<SocketAddr> {
    let sock: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid metrics_addr '{addr}'"))?;
    PrometheusBuilder::new()
        .with_http_listener(sock)
        .install()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    Ok(sock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_addr_is_rejected_before_install() {
        let err = install_prometheus("not-an-addr").unwrap_err();
        assert!(err.to_string().contains("invalid metrics_addr"));
    }
}
