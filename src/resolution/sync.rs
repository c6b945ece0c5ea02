use std::collections::HashSet;
use std::time::Instant;

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use metrics::{counter, histogram};
use serde::Serialize;
use sqlx::PgPool;
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::db::{market_repo, trade_repo};
use crate::polymarket::{league_event_slug, GammaClient, GammaMarket};
use crate::resolution::decision;

// Candidate caps per invocation.
const RECENT_CAP: i64 = 200;
const DUE_CAP: i64 = 200;
const ALL_CAP: i64 = 1000;
const SLUG_SCAN_CAP: i64 = 500;

/// Pause between fork/join batches to bound the upstream request rate.
const BATCH_PAUSE_MS: u64 = 500;

/// Candidate-selection strategy for one sync invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Markets referenced by trades within the lookback window.
    Recent,
    /// Markets whose last check is older than the recheck window. Covers
    /// markets that stop trading long before upstream resolves them.
    Due,
    /// Full backfill over every unresolved market, oldest check first.
    All,
    /// Recent league-game markets, re-checked one event lookup at a time.
    EventsRecent,
    /// One market, by condition id or slug.
    Market(String),
    /// One event, by event slug.
    Event(String),
}

impl SyncMode {
    /// Parse an operator-supplied mode string plus optional target.
    pub fn parse(mode: &str, target: Option<&str>) -> Option<SyncMode> {
        match (mode, target) {
            ("recent", _) => Some(SyncMode::Recent),
            ("due", _) => Some(SyncMode::Due),
            ("all", _) => Some(SyncMode::All),
            ("events_recent", _) => Some(SyncMode::EventsRecent),
            ("market", Some(t)) if !t.is_empty() => Some(SyncMode::Market(t.to_string())),
            ("event", Some(t)) if !t.is_empty() => Some(SyncMode::Event(t.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Recent => "recent",
            SyncMode::Due => "due",
            SyncMode::All => "all",
            SyncMode::EventsRecent => "events_recent",
            SyncMode::Market(_) => "market",
            SyncMode::Event(_) => "event",
        }
    }
}

/// Counts reported back to the operator after a sync run.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub mode: String,
    pub candidates: u32,
    pub checked: u32,
    pub resolved: u32,
    pub touched: u32,
    pub skipped: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Copy)]
enum CheckOutcome {
    Resolved,
    Touched,
    Skipped,
}

/// Run one resolution pass for the given mode. Per-market failures are
/// counted and skipped; the run itself only fails on store errors during
/// candidate selection.
pub async fn run_resolution_sync(
    gamma: &GammaClient,
    pool: &PgPool,
    mode: SyncMode,
    config: &AppConfig,
) -> anyhow::Result<SyncReport> {
    let started = Instant::now();
    let mut report = SyncReport {
        mode: mode.as_str().to_string(),
        ..Default::default()
    };

    match &mode {
        SyncMode::EventsRecent => {
            let events = recent_event_slugs(pool, config).await?;
            report.candidates = events.len() as u32;
            run_event_batches(gamma, pool, &events, config, &mut report).await;
        }
        SyncMode::Event(slug) => {
            report.candidates = 1;
            run_event_batches(gamma, pool, &[slug.clone()], config, &mut report).await;
        }
        _ => {
            let candidates = select_market_candidates(pool, &mode, config).await?;
            report.candidates = candidates.len() as u32;
            run_market_batches(gamma, pool, &candidates, config, &mut report).await;
        }
    }

    histogram!("resolution_run_seconds").record(started.elapsed().as_secs_f64());
    counter!("resolution_runs_total").increment(1);

    tracing::info!(
        mode = %report.mode,
        candidates = report.candidates,
        checked = report.checked,
        resolved = report.resolved,
        touched = report.touched,
        skipped = report.skipped,
        errors = report.errors,
        "Resolution sync finished"
    );

    Ok(report)
}

/// Bounded candidate list of (condition_id, slug) pairs for the
/// market-oriented modes.
async fn select_market_candidates(
    pool: &PgPool,
    mode: &SyncMode,
    config: &AppConfig,
) -> anyhow::Result<Vec<(String, Option<String>)>> {
    let candidates = match mode {
        SyncMode::Recent => {
            let since = Utc::now() - Duration::days(config.lookback_days);
            let ids = trade_repo::recent_market_ids(pool, since, RECENT_CAP).await?;

            // Trades can reference markets the placeholder upsert hasn't
            // seen yet (e.g. after a partial run); guarantee rows exist
            // before selecting against them.
            let placeholders: Vec<(String, Option<String>, Option<String>)> =
                ids.iter().map(|id| (id.clone(), None, None)).collect();
            market_repo::ensure_markets(pool, &placeholders).await?;

            market_repo::get_markets_by_ids(pool, &ids)
                .await?
                .into_iter()
                .filter(|m| !m.resolved)
                .map(|m| (m.condition_id, m.slug))
                .collect()
        }
        SyncMode::Due => {
            let older_than = Utc::now() - Duration::hours(config.recheck_hours);
            market_repo::get_due_markets(pool, older_than, DUE_CAP)
                .await?
                .into_iter()
                .map(|m| (m.condition_id, m.slug))
                .collect()
        }
        SyncMode::All => market_repo::get_unresolved_markets(pool, ALL_CAP)
            .await?
            .into_iter()
            .map(|m| (m.condition_id, m.slug))
            .collect(),
        SyncMode::Market(target) => match market_repo::get_market(pool, target).await? {
            Some(m) if m.resolved => Vec::new(),
            Some(m) => vec![(m.condition_id, m.slug)],
            // Unknown to the store: let the upstream lookups try the
            // target as a slug first, then as a condition id.
            None => vec![(target.clone(), Some(target.clone()))],
        },
        _ => Vec::new(),
    };

    Ok(candidates)
}

/// Check market candidates in bounded fork/join batches with a pause
/// between batches.
async fn run_market_batches(
    gamma: &GammaClient,
    pool: &PgPool,
    candidates: &[(String, Option<String>)],
    config: &AppConfig,
    report: &mut SyncReport,
) {
    let batch_size = config.resolution_batch_size.max(1);

    for (i, chunk) in candidates.chunks(batch_size).enumerate() {
        if i > 0 {
            sleep(std::time::Duration::from_millis(BATCH_PAUSE_MS)).await;
        }

        let checks = chunk
            .iter()
            .map(|(id, slug)| check_market(gamma, pool, id, slug.as_deref()));

        for result in join_all(checks).await {
            tally(report, result);
        }
    }
}

/// Check event candidates in bounded fork/join batches.
async fn run_event_batches(
    gamma: &GammaClient,
    pool: &PgPool,
    event_slugs: &[String],
    config: &AppConfig,
    report: &mut SyncReport,
) {
    let batch_size = config.resolution_batch_size.max(1);

    for (i, chunk) in event_slugs.chunks(batch_size).enumerate() {
        if i > 0 {
            sleep(std::time::Duration::from_millis(BATCH_PAUSE_MS)).await;
        }

        let checks = chunk.iter().map(|slug| check_event(gamma, pool, slug));

        for outcomes in join_all(checks).await {
            match outcomes {
                Ok(results) => {
                    for result in results {
                        tally(report, result);
                    }
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(error = %e, "Event resolution check failed");
                }
            }
        }
    }
}

fn tally(report: &mut SyncReport, result: anyhow::Result<CheckOutcome>) {
    match result {
        Ok(CheckOutcome::Resolved) => {
            report.checked += 1;
            report.resolved += 1;
        }
        Ok(CheckOutcome::Touched) => {
            report.checked += 1;
            report.touched += 1;
        }
        Ok(CheckOutcome::Skipped) => report.skipped += 1,
        Err(e) => {
            report.errors += 1;
            tracing::warn!(error = %e, "Market resolution check failed");
        }
    }
}

/// Check one market: descriptor by slug first, fallback by condition id,
/// then apply the decision engine.
async fn check_market(
    gamma: &GammaClient,
    pool: &PgPool,
    condition_id: &str,
    slug: Option<&str>,
) -> anyhow::Result<CheckOutcome> {
    let mut descriptor: Option<GammaMarket> = None;

    if let Some(slug) = slug {
        match gamma.get_market_by_slug(slug).await {
            Ok(found) => descriptor = found,
            Err(e) => {
                tracing::debug!(slug, error = %e, "Slug lookup failed — falling back to condition id");
            }
        }
    }

    if descriptor.is_none() {
        descriptor = gamma
            .get_markets_by_condition_ids(&[condition_id.to_string()])
            .await?
            .into_iter()
            .next();
    }

    let Some(descriptor) = descriptor else {
        tracing::debug!(condition_id, "No upstream descriptor found — skipping");
        return Ok(CheckOutcome::Skipped);
    };

    apply_verdict(pool, condition_id, &descriptor).await
}

/// Check one event: a single upstream lookup covers every market leg.
async fn check_event(
    gamma: &GammaClient,
    pool: &PgPool,
    event_slug: &str,
) -> anyhow::Result<Vec<anyhow::Result<CheckOutcome>>> {
    let Some(event) = gamma.get_event_by_slug(event_slug).await? else {
        tracing::debug!(event_slug, "No upstream event found — skipping");
        return Ok(vec![Ok(CheckOutcome::Skipped)]);
    };

    let mut results = Vec::with_capacity(event.markets.len());
    for market in &event.markets {
        let Some(condition_id) = market.condition_id.clone() else {
            results.push(Ok(CheckOutcome::Skipped));
            continue;
        };

        // The event may carry legs ingestion never saw.
        let placeholder = vec![(
            condition_id.clone(),
            market.slug.clone(),
            market.question.clone(),
        )];
        if let Err(e) = market_repo::ensure_markets(pool, &placeholder).await {
            results.push(Err(e));
            continue;
        }

        results.push(apply_verdict(pool, &condition_id, market).await);
    }

    Ok(results)
}

/// Apply a verdict: persist resolved-with-winner, otherwise rotate the
/// market to the back of the due queue. A resolved-but-winnerless verdict
/// is logged and deliberately not persisted.
async fn apply_verdict(
    pool: &PgPool,
    condition_id: &str,
    descriptor: &GammaMarket,
) -> anyhow::Result<CheckOutcome> {
    let verdict = decision::decide(descriptor);
    let slug = descriptor.slug.as_deref();
    let question = descriptor.question.as_deref();

    if verdict.resolved {
        if let Some(winner) = &verdict.winning_outcome {
            let updated =
                market_repo::mark_resolved(pool, condition_id, winner, slug, question).await?;
            if updated {
                counter!("markets_resolved_total").increment(1);
                tracing::info!(
                    condition_id,
                    winner = %winner,
                    explicit = verdict.explicit_winner,
                    settled = verdict.settled_prices,
                    "Market resolved"
                );
            }
            return Ok(CheckOutcome::Resolved);
        }

        tracing::info!(
            condition_id,
            "Market reports resolved without a winning outcome — leaving unresolved"
        );
    }

    market_repo::touch_checked(pool, condition_id, slug, question).await?;
    Ok(CheckOutcome::Touched)
}

/// Distinct event slugs reconstructed from recent league-game market
/// slugs. One event lookup then covers every leg of a game.
async fn recent_event_slugs(pool: &PgPool, config: &AppConfig) -> anyhow::Result<Vec<String>> {
    let since = Utc::now() - Duration::days(config.lookback_days);
    let slugs = trade_repo::recent_market_slugs(pool, since, SLUG_SCAN_CAP).await?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut events = Vec::new();
    for slug in &slugs {
        if let Some(event) = league_event_slug(slug) {
            if seen.insert(event.clone()) {
                events.push(event);
            }
        }
    }

    Ok(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_modes() {
        assert_eq!(SyncMode::parse("recent", None), Some(SyncMode::Recent));
        assert_eq!(SyncMode::parse("due", None), Some(SyncMode::Due));
        assert_eq!(SyncMode::parse("all", None), Some(SyncMode::All));
        assert_eq!(
            SyncMode::parse("events_recent", None),
            Some(SyncMode::EventsRecent)
        );
    }

    #[test]
    fn targeted_modes_require_a_target() {
        assert_eq!(
            SyncMode::parse("market", Some("0xcond")),
            Some(SyncMode::Market("0xcond".into()))
        );
        assert_eq!(
            SyncMode::parse("event", Some("nba-lal-bos-2025-01-15")),
            Some(SyncMode::Event("nba-lal-bos-2025-01-15".into()))
        );
        assert_eq!(SyncMode::parse("market", None), None);
        assert_eq!(SyncMode::parse("event", Some("")), None);
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert_eq!(SyncMode::parse("yolo", None), None);
    }
}
