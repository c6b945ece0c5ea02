use std::collections::{HashMap, HashSet};
use std::time::Instant;

use metrics::{counter, histogram};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use sqlx::PgPool;

use crate::alerts::engine;
use crate::alerts::notifier::Notifier;
use crate::config::AppConfig;
use crate::db::{market_repo, stats_repo, trade_repo};
use crate::ingestion::normalizer::{self, DropCounts, TradeMeta};
use crate::models::NewTrade;
use crate::polymarket::DataClient;

/// Pagination state. Each page's request depends on the offset advanced by
/// the previous page, so fetching is strictly sequential; the stop/continue
/// policy lives entirely in [`advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Fetching { page: u32, offset: u32 },
    /// Upstream answered with a client-class error at the pagination tail —
    /// normal end of data, not a failure.
    SoftStopped,
    /// Any other upstream failure. Aborts the run.
    HardFailed,
    /// A zero-row page, or the page budget ran out.
    Exhausted,
}

/// What one page attempt yielded, reduced to what the transition needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Rows(usize),
    ClientError,
    Failure,
}

/// The single transition function of the pagination state machine.
pub fn advance(page: u32, offset: u32, outcome: PageOutcome, config: &AppConfig) -> FetchState {
    match outcome {
        PageOutcome::Rows(0) => FetchState::Exhausted,
        PageOutcome::Rows(_) if page + 1 >= config.max_pages => FetchState::Exhausted,
        PageOutcome::Rows(_) => FetchState::Fetching {
            page: page + 1,
            offset: offset + config.page_size,
        },
        PageOutcome::ClientError => FetchState::SoftStopped,
        PageOutcome::Failure => FetchState::HardFailed,
    }
}

/// Counts reported back to the operator after a run.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub pages: u32,
    pub fetched: u32,
    pub stored: u64,
    pub alerts_created: u32,
    pub skipped_extreme: u32,
    pub dropped: DropCounts,
    pub stopped: &'static str,
}

/// Run one ingestion pass: paginate the trade feed, normalize and dedup
/// each page, persist trades and market placeholders, and hand each page's
/// valid rows to the alert engine. Hard upstream failures abort with an
/// error; everything row-level is counted, not fatal.
pub async fn run_ingestion(
    data_client: &DataClient,
    pool: &PgPool,
    notifier: Option<&Notifier>,
    config: &AppConfig,
) -> anyhow::Result<IngestReport> {
    let started = Instant::now();
    let mut report = IngestReport::default();
    let min_amount = config.min_trade_size.to_u32().unwrap_or(0);

    let mut state = FetchState::Fetching { page: 0, offset: 0 };

    while let FetchState::Fetching { page, offset } = state {
        let result = data_client
            .get_trades(config.page_size, offset, min_amount)
            .await;

        let outcome = match &result {
            Ok(rows) => PageOutcome::Rows(rows.len()),
            Err(e) if e.is_client_error() => PageOutcome::ClientError,
            Err(_) => PageOutcome::Failure,
        };

        match result {
            Ok(raw_rows) => {
                if !raw_rows.is_empty() {
                    report.pages += 1;
                    report.fetched += raw_rows.len() as u32;
                    counter!("trades_fetched_total").increment(raw_rows.len() as u64);
                    process_page(pool, notifier, config, &raw_rows, &mut report).await?;
                }
            }
            Err(e) if e.is_client_error() => {
                tracing::info!(
                    page,
                    offset,
                    error = %e,
                    "Trade feed returned client error — treating as end of data"
                );
            }
            Err(e) => {
                tracing::error!(page, offset, error = %e, "Trade feed request failed");
                counter!("ingest_hard_failures_total").increment(1);
                return Err(anyhow::anyhow!("trade feed request failed: {e}"));
            }
        }

        state = advance(page, offset, outcome, config);
    }

    report.stopped = match state {
        FetchState::SoftStopped => "soft_end",
        FetchState::Exhausted => "exhausted",
        // Hard failures returned above; Fetching cannot escape the loop.
        _ => "unknown",
    };

    // Post-run aggregate recomputes are the store's own jobs; a failure
    // here degrades ranking freshness, not this run.
    if let Err(e) = stats_repo::refresh_trader_rankings(pool).await {
        tracing::warn!(error = %e, "Trader ranking recompute failed");
    }
    if let Err(e) = stats_repo::refresh_market_stats(pool).await {
        tracing::warn!(error = %e, "Market stats refresh failed");
    }

    histogram!("ingest_run_seconds").record(started.elapsed().as_secs_f64());
    counter!("ingest_runs_total").increment(1);

    tracing::info!(
        pages = report.pages,
        fetched = report.fetched,
        stored = report.stored,
        alerts = report.alerts_created,
        dropped = report.dropped.total(),
        stopped = report.stopped,
        "Ingestion run finished"
    );

    Ok(report)
}

/// Normalize → dedup → persist → placeholder markets → alert engine, for
/// one fetched page.
async fn process_page(
    pool: &PgPool,
    notifier: Option<&Notifier>,
    config: &AppConfig,
    raw_rows: &[crate::polymarket::FeedTrade],
    report: &mut IngestReport,
) -> anyhow::Result<()> {
    let mut meta: HashMap<String, TradeMeta> = HashMap::new();
    let mut valid: Vec<NewTrade> = Vec::with_capacity(raw_rows.len());

    for raw in raw_rows {
        match normalizer::normalize_row(raw, config.min_trade_size) {
            Ok(trade) => {
                normalizer::record_meta(&mut meta, raw, &trade);
                valid.push(trade);
            }
            Err(reason) => {
                report.dropped.record(reason);
                counter!("trade_rows_dropped_total").increment(1);
            }
        }
    }

    let deduped = normalizer::dedup_page(valid);
    if deduped.is_empty() {
        return Ok(());
    }

    let stored = trade_repo::upsert_trades(pool, &deduped).await?;
    report.stored += stored;
    counter!("trades_stored_total").increment(stored);

    // Register referenced markets as placeholders before any resolution
    // pass can select them.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut markets: Vec<(String, Option<String>, Option<String>)> = Vec::new();
    for t in &deduped {
        if seen.insert(t.condition_id.as_str()) {
            markets.push((
                t.condition_id.clone(),
                t.market_slug.clone(),
                t.market_title.clone(),
            ));
        }
    }
    market_repo::ensure_markets(pool, &markets).await?;

    let outcome = engine::evaluate_page(pool, &deduped, &meta, notifier, config).await?;
    report.alerts_created += outcome.created;
    report.skipped_extreme += outcome.skipped_extreme;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn test_config(page_size: u32, max_pages: u32) -> AppConfig {
        AppConfig {
            database_url: "postgres://test".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            page_size,
            max_pages,
            min_trade_size: Decimal::from(500),
            copyable_rank_cutoff: 50,
            copyable_min_roi: Decimal::from(10),
            copyable_min_pnl: Decimal::from(1000),
            copyable_min_median_bet: Decimal::from(100),
            copyable_min_amount: Decimal::from(1000),
            copyable_cooldown_hours: 6,
            ranking_staleness_hours: 26,
            alerts_per_hour: 10,
            isolated_min_amount: Decimal::from(5000),
            isolated_min_amount_extreme: Decimal::from(15000),
            isolated_extreme_price: Decimal::from_str("0.90").unwrap(),
            extreme_price_band: Decimal::from_str("0.95").unwrap(),
            recheck_hours: 12,
            lookback_days: 7,
            resolution_batch_size: 5,
            ingest_interval_secs: 0,
            resolution_interval_secs: 0,
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }

    #[test]
    fn full_page_advances_offset() {
        let config = test_config(500, 10);
        assert_eq!(
            advance(0, 0, PageOutcome::Rows(500), &config),
            FetchState::Fetching { page: 1, offset: 500 }
        );
    }

    #[test]
    fn partial_page_still_advances() {
        // The feed can return short pages mid-stream; only zero rows stop.
        let config = test_config(500, 10);
        assert_eq!(
            advance(2, 1000, PageOutcome::Rows(17), &config),
            FetchState::Fetching { page: 3, offset: 1500 }
        );
    }

    #[test]
    fn empty_page_exhausts() {
        let config = test_config(500, 10);
        assert_eq!(advance(3, 1500, PageOutcome::Rows(0), &config), FetchState::Exhausted);
    }

    #[test]
    fn page_budget_exhausts() {
        let config = test_config(500, 10);
        assert_eq!(
            advance(9, 4500, PageOutcome::Rows(500), &config),
            FetchState::Exhausted
        );
    }

    #[test]
    fn client_error_is_a_soft_stop() {
        let config = test_config(500, 10);
        assert_eq!(
            advance(4, 2000, PageOutcome::ClientError, &config),
            FetchState::SoftStopped
        );
    }

    #[test]
    fn other_errors_are_hard_failures() {
        let config = test_config(500, 10);
        assert_eq!(
            advance(0, 0, PageOutcome::Failure, &config),
            FetchState::HardFailed
        );
    }
}
