//! Producer entrypoint: polls Finnhub and publishes normalized news and
//! quotes to their streams until Ctrl-C.
//!
//! Usage: `market-stream-ingest [news|quotes|all]` (default `all`).

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use market_stream_ingest::config::{PipelineConfig, ProducerEnv};
use market_stream_ingest::ingest::providers::finnhub::FinnhubClient;
use market_stream_ingest::ingest::scheduler::{spawn_news_scheduler, spawn_quote_scheduler, SchedulerCfg};
use market_stream_ingest::telemetry;
use tracing::{error, info};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    News,
    Quotes,
    All,
}

fn parse_mode(arg: Option<String>) -> Result<Mode> {
    match arg.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("all") => Ok(Mode::All),
        Some("news") => Ok(Mode::News),
        Some("quotes") => Ok(Mode::Quotes),
        Some(other) => bail!("unknown mode '{other}', expected news|quotes|all"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mode = parse_mode(std::env::args().nth(1))?;
    let cfg = PipelineConfig::load_default().context("loading pipeline config")?;
    let env = ProducerEnv::from_env(mode != Mode::Quotes).context("reading producer environment")?;
    info!(symbols = ?cfg.symbols, base_url = %cfg.api_base_url, "configuration loaded");

    if let Some(addr) = cfg.metrics_addr.as_deref() {
        let sock = telemetry::install_prometheus(addr)?;
        info!(%sock, "prometheus exporter listening");
    }

    let client = Arc::new(
        FinnhubClient::new(cfg.api_base_url.clone(), env.api_key.clone())
            .with_timeouts(cfg.news.request_timeout_secs, cfg.quotes.request_timeout_secs),
    );
    let mut tasks = Vec::new();

    if mode != Mode::Quotes {
        if let Some(target) = &env.news_target {
            info!(stream = ?target, "starting company news producer");
            tasks.push(spawn_news_scheduler(
                SchedulerCfg::news(&cfg),
                cfg.news.lookback_days,
                cfg.symbols.clone(),
                client.clone(),
                target.build(),
            ));
        }
    }
    if mode != Mode::News {
        info!(stream = ?env.quotes_target, "starting stock quotes producer");
        tasks.push(spawn_quote_scheduler(
            SchedulerCfg::quotes(&cfg),
            cfg.symbols.clone(),
            client.clone(),
            env.quotes_target.build(),
        ));
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("producers stopped by user");
    for t in tasks {
        t.abort();
        if let Err(e) = t.await {
            if !e.is_cancelled() {
                error!(error = ?e, "producer task ended abnormally");
            }
        }
    }
    info!("producers shutting down");
    Ok(())
}
