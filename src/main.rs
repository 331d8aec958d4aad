mod acquisition;
mod config;
mod error;
mod normalizer;
mod sink;
mod transport;
mod types;

#[cfg(test)]
mod testutil;

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::acquisition::MatchSource;
use crate::config::Config;
use crate::error::Result;
use crate::normalizer::normalize;
use crate::sink::CsvSink;
use crate::transport::LatencyStats;
use crate::types::DateRange;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let range = DateRange::lookback(today, cfg.lookback_months);
    info!("Scraping {} (finished matches {range})", cfg.transport.url);

    // --- Finished matches ---
    scrape_to_csv(&cfg, MatchSource::PaginatedFinished(range), &cfg.past_csv_path).await?;

    // --- Upcoming matches ---
    if cfg.skip_upcoming {
        warn!("SKIP_UPCOMING set, upcoming matches not scraped");
    } else {
        scrape_to_csv(&cfg, MatchSource::BulkUpcoming, &cfg.upcoming_csv_path).await?;
    }

    Ok(())
}

/// Acquire, normalize and persist one source. Nothing is written unless the
/// whole acquisition succeeded.
async fn scrape_to_csv(cfg: &Config, source: MatchSource, path: &str) -> Result<()> {
    let stage = source.label();
    let started = Instant::now();
    let latency = Arc::new(LatencyStats::new());

    let pairs = source.acquire(&cfg.transport, &latency, cfg.odds_workers).await?;
    let records: Vec<Vec<String>> = pairs
        .iter()
        .map(|(record, odds)| normalize(record, odds).to_record())
        .collect();

    let sink = CsvSink::new(path);
    let row_count = records.len();
    let stored = tokio::task::spawn_blocking(move || sink.persist(&records)).await??;

    latency.log_summary(stage);
    info!(
        stage,
        rows = row_count,
        stored,
        elapsed_s = started.elapsed().as_secs_f64(),
        "[{stage}] {row_count} rows normalized, {stored} rows in {path} ({:.1}s)",
        started.elapsed().as_secs_f64(),
    );
    Ok(())
}
