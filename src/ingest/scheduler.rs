// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, Utc};
use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::ingest::news::{normalize_news, HighWaterMarks};
use crate::ingest::quotes::normalize_quote;
use crate::ingest::types::{DateRange, NewsSource, QuoteSource};
use crate::sink::{publish, RecordSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub inter_symbol_pause: Duration,
    pub overrun_sleep: Duration,
    pub heartbeat: Duration,
}

impl SchedulerCfg {
    pub fn news(cfg: &PipelineConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.news.interval_secs),
            inter_symbol_pause: Duration::from_secs(cfg.news.inter_symbol_pause_secs),
            overrun_sleep: Duration::from_secs(cfg.news.overrun_sleep_secs),
            heartbeat: Duration::from_secs(cfg.heartbeat_secs),
        }
    }

    pub fn quotes(cfg: &PipelineConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.quotes.interval_secs),
            inter_symbol_pause: Duration::from_secs(cfg.quotes.inter_symbol_pause_secs),
            overrun_sleep: Duration::from_secs(cfg.quotes.overrun_sleep_secs),
            heartbeat: Duration::from_secs(cfg.heartbeat_secs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub symbols: usize,
    pub fetch_failures: usize,
    pub emitted: usize,
    pub publish_failures: usize,
}

/// `[today - lookback_days, today]`, formatted `YYYY-MM-DD`.
pub fn news_date_range(today: NaiveDate, lookback_days: u32) -> DateRange {
    let from = today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN);
    DateRange {
        from: from.format("%Y-%m-%d").to_string(),
        to: today.format("%Y-%m-%d").to_string(),
    }
}

/// Time left in the interval after a cycle, or `overrun` if the cycle ran long.
pub fn next_sleep(interval: Duration, elapsed: Duration, overrun: Duration) -> Duration {
    interval.checked_sub(elapsed).unwrap_or(overrun)
}

/// One pass over all symbols: fetch, normalize against `marks`, publish.
///
/// A failed fetch leaves the symbol's mark alone. A failed publish does not
/// roll the mark back; that record is lost for this process.
pub async fn run_news_cycle(
    source: &dyn NewsSource,
    sink: &dyn RecordSink,
    symbols: &[String],
    range: &DateRange,
    marks: &mut HighWaterMarks,
    pause: Duration,
) -> CycleReport {
    let mut report = CycleReport {
        symbols: symbols.len(),
        ..CycleReport::default()
    };

    for (i, symbol) in symbols.iter().enumerate() {
        info!(symbol = %symbol, n = i + 1, of = symbols.len(), "fetching company news");

        match source.company_news(symbol, range).await {
            Ok(raw) => {
                let records = raw
                    .as_array()
                    .map_or(0, |a| a.iter().filter(|v| v.is_object()).count());
                let articles = normalize_news(Utc::now(), &raw, symbol, marks);

                counter!("ingest_news_fetched_total").increment(records as u64);
                counter!("ingest_news_emitted_total").increment(articles.len() as u64);
                counter!("ingest_news_duplicates_total")
                    .increment(records.saturating_sub(articles.len()) as u64);

                for article in &articles {
                    if !publish(sink, symbol, article).await {
                        error!(symbol = %symbol, news_id = ?article.news_id, "failed to send news article");
                        report.publish_failures += 1;
                    }
                }
                report.emitted += articles.len();
            }
            Err(e) => {
                warn!(error = ?e, symbol = %symbol, provider = source.name(), "news fetch failed");
                counter!("ingest_fetch_errors_total", "kind" => "news").increment(1);
                report.fetch_failures += 1;
            }
        }

        gauge!("news_high_water_mark", "symbol" => symbol.clone()).set(marks.get(symbol) as f64);

        if i + 1 < symbols.len() && !pause.is_zero() {
            debug!(pause_secs = pause.as_secs(), "pausing before next symbol");
            tokio::time::sleep(pause).await;
        }
    }

    report
}

pub async fn run_quote_cycle(
    source: &dyn QuoteSource,
    sink: &dyn RecordSink,
    symbols: &[String],
    pause: Duration,
) -> CycleReport {
    let mut report = CycleReport {
        symbols: symbols.len(),
        ..CycleReport::default()
    };

    for (i, symbol) in symbols.iter().enumerate() {
        info!(symbol = %symbol, n = i + 1, of = symbols.len(), "fetching quote");

        match source.quote(symbol).await {
            Ok(Some(raw)) => match normalize_quote(Utc::now(), &raw, symbol) {
                Some(quote) => {
                    counter!("ingest_quotes_emitted_total").increment(1);
                    report.emitted += 1;
                    if !publish(sink, symbol, &quote).await {
                        report.publish_failures += 1;
                    }
                }
                None => warn!(symbol = %symbol, "could not process quote data after fetching"),
            },
            Ok(None) => warn!(symbol = %symbol, "no quote data returned"),
            Err(e) => {
                warn!(error = ?e, symbol = %symbol, provider = source.name(), "quote fetch failed");
                counter!("ingest_fetch_errors_total", "kind" => "quote").increment(1);
                report.fetch_failures += 1;
            }
        }

        if i + 1 < symbols.len() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    report
}

/// Sleep `total` in heartbeat-sized chunks, logging while a meaningful wait remains.
pub async fn sleep_with_heartbeat(total: Duration, heartbeat: Duration, producer: &str) {
    let heartbeat = heartbeat.max(Duration::from_secs(1));
    let mut remaining = total;
    while remaining > Duration::from_millis(10) {
        let chunk = remaining.min(heartbeat);
        tokio::time::sleep(chunk).await;
        remaining = remaining.saturating_sub(chunk);
        if remaining > heartbeat / 2 {
            info!(producer, next_poll_secs = remaining.as_secs(), "producer alive");
        }
    }
}

fn finish_cycle(producer: &'static str, cfg: &SchedulerCfg, started: Instant, report: &CycleReport) -> Duration {
    let elapsed = started.elapsed();
    histogram!("ingest_cycle_ms", "producer" => producer).record(elapsed.as_secs_f64() * 1_000.0);
    gauge!("ingest_last_cycle_ts", "producer" => producer).set(Utc::now().timestamp() as f64);

    info!(
        target: "ingest",
        producer,
        elapsed_secs = elapsed.as_secs_f64(),
        emitted = report.emitted,
        fetch_failures = report.fetch_failures,
        publish_failures = report.publish_failures,
        "polling cycle finished"
    );

    if elapsed > cfg.interval {
        warn!(
            producer,
            elapsed_secs = elapsed.as_secs_f64(),
            interval_secs = cfg.interval.as_secs(),
            "polling cycle exceeded interval"
        );
    }
    let wait = next_sleep(cfg.interval, elapsed, cfg.overrun_sleep);
    info!(producer, next_cycle_secs = wait.as_secs(), "sleeping until next cycle");
    wait
}

/// Spawn the news producer loop. The task owns the high-water-marks, so they
/// live exactly as long as the task.
pub fn spawn_news_scheduler(
    cfg: SchedulerCfg,
    lookback_days: u32,
    symbols: Vec<String>,
    source: Arc<dyn NewsSource>,
    sink: Arc<dyn RecordSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut marks = HighWaterMarks::new();
        loop {
            let started = Instant::now();
            let range = news_date_range(Utc::now().date_naive(), lookback_days);
            info!(
                target: "ingest",
                symbols = symbols.len(),
                from = %range.from,
                to = %range.to,
                "starting news polling cycle"
            );

            let report = run_news_cycle(
                source.as_ref(),
                sink.as_ref(),
                &symbols,
                &range,
                &mut marks,
                cfg.inter_symbol_pause,
            )
            .await;

            let wait = finish_cycle("news", &cfg, started, &report);
            sleep_with_heartbeat(wait, cfg.heartbeat, "news").await;
        }
    })
}

pub fn spawn_quote_scheduler(
    cfg: SchedulerCfg,
    symbols: Vec<String>,
    source: Arc<dyn QuoteSource>,
    sink: Arc<dyn RecordSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let started = Instant::now();
            info!(target: "ingest", symbols = symbols.len(), "starting quote polling cycle");
            let report =
                run_quote_cycle(source.as_ref(), sink.as_ref(), &symbols, cfg.inter_symbol_pause).await;
            let wait = finish_cycle("quotes", &cfg, started, &report);
            sleep_with_heartbeat(wait, cfg.heartbeat, "quotes").await;
        }
    })
}
