use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::alerts::notifier::{self, Notifier};
use crate::config::AppConfig;
use crate::db::stats_repo::IsolatedCandidate;
use crate::db::{alert_repo, stats_repo};
use crate::ingestion::normalizer::TradeMeta;
use crate::models::{AlertKind, NewAlert, NewTrade, TraderRanking};

/// What one page's alert evaluation produced.
#[derive(Debug, Default)]
pub struct PageAlertOutcome {
    pub created: u32,
    pub skipped_extreme: u32,
}

/// Evaluate one ingested page against both classifiers.
///
/// The hourly budget is read once at page start and threaded through the
/// classifiers as an explicit counter, so a single page cannot overshoot
/// the ceiling even though the count is an hour-trailing DB read.
pub async fn evaluate_page(
    pool: &PgPool,
    trades: &[NewTrade],
    meta: &HashMap<String, TradeMeta>,
    notifier: Option<&Notifier>,
    config: &AppConfig,
) -> anyhow::Result<PageAlertOutcome> {
    let mut outcome = PageAlertOutcome::default();
    if trades.is_empty() {
        return Ok(outcome);
    }

    let now = Utc::now();

    // Near-certain-outcome noise is excluded from both classifiers,
    // regardless of how favorable the other signals look.
    let mut eligible: Vec<&NewTrade> = Vec::with_capacity(trades.len());
    for t in trades {
        if is_extreme_price(t.price, config.extreme_price_band) {
            outcome.skipped_extreme += 1;
        } else {
            eligible.push(t);
        }
    }
    if eligible.is_empty() {
        return Ok(outcome);
    }

    let used = alert_repo::count_recent(pool, now - Duration::hours(1)).await?;
    let mut budget = remaining_budget(config.alerts_per_hour, used);
    if budget == 0 {
        tracing::info!(used, ceiling = config.alerts_per_hour, "Hourly alert budget exhausted");
        return Ok(outcome);
    }

    // One snapshot read for the whole page.
    let mut traders: Vec<String> = eligible.iter().map(|t| t.trader.clone()).collect();
    traders.sort();
    traders.dedup();
    let rankings: HashMap<String, TraderRanking> = stats_repo::get_rankings(pool, &traders)
        .await?
        .into_iter()
        .map(|r| (r.trader.clone(), r))
        .collect();

    // Copyable cooldowns, fetched up front per qualifying trader.
    let cooldown_since = now - Duration::hours(config.copyable_cooldown_hours);
    let mut on_cooldown: HashSet<String> = HashSet::new();
    for trader in &traders {
        let qualifies = rankings
            .get(trader)
            .is_some_and(|r| is_copyable_trader(r, config, now));
        if qualifies && alert_repo::has_recent_copyable(pool, trader, cooldown_since).await? {
            on_cooldown.insert(trader.clone());
        }
    }

    let mut pending: Vec<NewAlert> = Vec::new();

    // Classifier A: copyable whales.
    for (trade, ranking) in
        select_copyable(&eligible, &rankings, &on_cooldown, &mut budget, config, now)
    {
        let handle = notifier::trader_handle(meta.get(&trade.tx_hash), &trade.trader);
        pending.push(NewAlert {
            tx_hash: trade.tx_hash.clone(),
            kind: AlertKind::Copyable,
            message: notifier::format_copyable(trade, ranking, &handle),
        });
    }

    // Classifier B: isolated contacts. Candidates are filtered locally,
    // then confirmed by the store's batched three-way check.
    let candidates = select_isolated_candidates(&eligible, &rankings, config, now);
    if !candidates.is_empty() && budget > 0 {
        let payload: Vec<IsolatedCandidate> = candidates
            .iter()
            .map(|t| IsolatedCandidate {
                tx_hash: t.tx_hash.clone(),
                trader: t.trader.clone(),
                condition_id: t.condition_id.clone(),
                amount: t.amount,
            })
            .collect();
        let confirmed: HashSet<String> = stats_repo::check_isolated_contacts(pool, &payload)
            .await?
            .into_iter()
            .collect();

        for trade in take_confirmed(&candidates, &confirmed, &mut budget) {
            let handle = notifier::trader_handle(meta.get(&trade.tx_hash), &trade.trader);
            pending.push(NewAlert {
                tx_hash: trade.tx_hash.clone(),
                kind: AlertKind::IsolatedContact,
                message: notifier::format_isolated(trade, &handle),
            });
        }
    }

    if pending.is_empty() {
        return Ok(outcome);
    }

    // Only rows the insert actually returned are new; anything else was
    // alerted by a prior run and must not notify again.
    let inserted: HashSet<String> = alert_repo::insert_alerts(pool, &pending)
        .await?
        .into_iter()
        .collect();
    outcome.created = inserted.len() as u32;
    counter!("alerts_created_total").increment(inserted.len() as u64);

    if let Some(n) = notifier {
        let by_hash: HashMap<&str, &NewTrade> =
            eligible.iter().map(|t| (t.tx_hash.as_str(), *t)).collect();

        for alert in pending.iter().filter(|a| inserted.contains(&a.tx_hash)) {
            let Some(trade) = by_hash.get(alert.tx_hash.as_str()) else {
                continue;
            };
            let link = notifier::deep_link(meta.get(&alert.tx_hash), trade.market_slug.as_deref());
            let message = format!("{}\n{}", alert.message, link);
            if n.send(&message).await {
                if let Err(e) = alert_repo::mark_sent(pool, &alert.tx_hash).await {
                    tracing::warn!(error = %e, tx_hash = %alert.tx_hash, "Failed to mark alert sent");
                }
            }
        }
    }

    tracing::info!(
        created = outcome.created,
        skipped_extreme = outcome.skipped_extreme,
        budget_left = budget,
        "Alert engine finished page"
    );

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Gates — pure, tested in isolation
// ---------------------------------------------------------------------------

/// Price at or beyond the exclusion band on either end.
pub fn is_extreme_price(price: Decimal, band: Decimal) -> bool {
    price >= band || price <= Decimal::ONE - band
}

/// How much of the hourly ceiling is left given the trailing-hour count.
pub fn remaining_budget(ceiling: i64, used: i64) -> i64 {
    (ceiling - used).max(0)
}

/// Trader-level copyable gates: ranked inside the cutoff on a fresh
/// snapshot, with ROI, realized P/L, and median bet each clearing their
/// minimum. Trade-level gates (amount, cooldown) are separate.
pub fn is_copyable_trader(r: &TraderRanking, config: &AppConfig, now: DateTime<Utc>) -> bool {
    r.rank <= config.copyable_rank_cutoff
        && now - r.computed_at <= Duration::hours(config.ranking_staleness_hours)
        && r.roi >= config.copyable_min_roi
        && r.realized_pnl >= config.copyable_min_pnl
        && r.median_bet >= config.copyable_min_median_bet
}

/// The isolated-contact size floor, raised for prices near the ends of
/// the allowed band.
pub fn isolated_threshold(price: Decimal, config: &AppConfig) -> Decimal {
    if price >= config.isolated_extreme_price
        || price <= Decimal::ONE - config.isolated_extreme_price
    {
        config.isolated_min_amount_extreme
    } else {
        config.isolated_min_amount
    }
}

/// Pick the copyable alerts for a page, consuming budget as alerts are
/// produced. At most one copyable alert per trader per page — a second
/// trade by the same trader lands inside the cooldown by construction.
pub fn select_copyable<'t, 'r>(
    trades: &[&'t NewTrade],
    rankings: &'r HashMap<String, TraderRanking>,
    on_cooldown: &HashSet<String>,
    budget: &mut i64,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Vec<(&'t NewTrade, &'r TraderRanking)> {
    let mut selected = Vec::new();
    let mut alerted_this_page: HashSet<&str> = HashSet::new();

    for trade in trades {
        if *budget == 0 {
            break;
        }
        let Some(ranking) = rankings.get(&trade.trader) else {
            continue;
        };
        if !is_copyable_trader(ranking, config, now) {
            continue;
        }
        if trade.amount < config.copyable_min_amount {
            continue;
        }
        if on_cooldown.contains(&trade.trader) || alerted_this_page.contains(trade.trader.as_str())
        {
            continue;
        }

        alerted_this_page.insert(trade.trader.as_str());
        *budget -= 1;
        selected.push((*trade, ranking));
    }

    selected
}

/// Pre-batch isolated-contact filter: trader is not copyable and the
/// amount clears the price-aware floor. The joint rarity/thinness/outsized
/// conditions are the store's batched check, not ours.
pub fn select_isolated_candidates<'t>(
    trades: &[&'t NewTrade],
    rankings: &HashMap<String, TraderRanking>,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Vec<&'t NewTrade> {
    trades
        .iter()
        .filter(|t| {
            let copyable = rankings
                .get(&t.trader)
                .is_some_and(|r| is_copyable_trader(r, config, now));
            !copyable && t.amount >= isolated_threshold(t.price, config)
        })
        .copied()
        .collect()
}

/// Keep the candidates the store confirmed, consuming remaining budget.
pub fn take_confirmed<'t>(
    candidates: &[&'t NewTrade],
    confirmed: &HashSet<String>,
    budget: &mut i64,
) -> Vec<&'t NewTrade> {
    let mut taken = Vec::new();
    for trade in candidates {
        if *budget == 0 {
            break;
        }
        if confirmed.contains(&trade.tx_hash) {
            *budget -= 1;
            taken.push(*trade);
        }
    }
    taken
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use std::str::FromStr;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://test".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            page_size: 500,
            max_pages: 10,
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

    fn make_trade(hash: &str, trader: &str, amount: i64, price: &str) -> NewTrade {
        NewTrade {
            tx_hash: hash.into(),
            condition_id: "0xcond".into(),
            market_slug: Some("will-it-rain".into()),
            market_title: Some("Will it rain?".into()),
            trader: trader.into(),
            outcome: Some("Yes".into()),
            side: Side::Buy,
            size: Decimal::from(amount),
            price: Decimal::from_str(price).unwrap(),
            amount: Decimal::from(amount),
            traded_at: Utc::now(),
        }
    }

    fn make_ranking(trader: &str, rank: i32) -> TraderRanking {
        TraderRanking {
            trader: trader.into(),
            rank,
            roi: Decimal::from(25),
            realized_pnl: Decimal::from(20_000),
            median_bet: Decimal::from(500),
            wins: 40,
            losses: 12,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn extreme_band_is_inclusive_on_both_ends() {
        let band = Decimal::from_str("0.95").unwrap();
        assert!(is_extreme_price(Decimal::from_str("0.95").unwrap(), band));
        assert!(is_extreme_price(Decimal::from_str("0.99").unwrap(), band));
        assert!(is_extreme_price(Decimal::from_str("0.05").unwrap(), band));
        assert!(is_extreme_price(Decimal::from_str("0.01").unwrap(), band));
        assert!(!is_extreme_price(Decimal::from_str("0.94").unwrap(), band));
        assert!(!is_extreme_price(Decimal::from_str("0.06").unwrap(), band));
    }

    #[test]
    fn rank_outside_cutoff_never_qualifies() {
        let config = test_config();
        let now = Utc::now();
        // Rank 51 under a cutoff of 50 — stellar numbers don't matter.
        let mut ranking = make_ranking("0xt", 51);
        ranking.roi = Decimal::from(500);
        ranking.realized_pnl = Decimal::from(1_000_000);
        ranking.median_bet = Decimal::from(50_000);
        assert!(!is_copyable_trader(&ranking, &config, now));
        assert!(is_copyable_trader(&make_ranking("0xt", 50), &config, now));
    }

    #[test]
    fn stale_snapshot_never_qualifies() {
        let config = test_config();
        let now = Utc::now();
        let mut ranking = make_ranking("0xt", 1);
        ranking.computed_at = now - Duration::hours(config.ranking_staleness_hours + 1);
        assert!(!is_copyable_trader(&ranking, &config, now));
    }

    #[test]
    fn metric_floors_gate_each_independently() {
        let config = test_config();
        let now = Utc::now();

        let mut low_roi = make_ranking("0xt", 1);
        low_roi.roi = Decimal::from(9);
        assert!(!is_copyable_trader(&low_roi, &config, now));

        let mut low_pnl = make_ranking("0xt", 1);
        low_pnl.realized_pnl = Decimal::from(999);
        assert!(!is_copyable_trader(&low_pnl, &config, now));

        let mut low_median = make_ranking("0xt", 1);
        low_median.median_bet = Decimal::from(99);
        assert!(!is_copyable_trader(&low_median, &config, now));
    }

    #[test]
    fn isolated_floor_rises_at_extreme_prices() {
        let config = test_config();
        assert_eq!(
            isolated_threshold(Decimal::from_str("0.50").unwrap(), &config),
            config.isolated_min_amount
        );
        assert_eq!(
            isolated_threshold(Decimal::from_str("0.92").unwrap(), &config),
            config.isolated_min_amount_extreme
        );
        assert_eq!(
            isolated_threshold(Decimal::from_str("0.08").unwrap(), &config),
            config.isolated_min_amount_extreme
        );
    }

    #[test]
    fn budget_never_goes_negative() {
        assert_eq!(remaining_budget(10, 3), 7);
        assert_eq!(remaining_budget(10, 10), 0);
        assert_eq!(remaining_budget(10, 14), 0);
    }

    #[test]
    fn copyable_selection_consumes_budget() {
        let config = test_config();
        let now = Utc::now();
        let trades: Vec<NewTrade> = (0..3)
            .map(|i| make_trade(&format!("0xh{i}"), &format!("0xt{i}"), 5_000, "0.60"))
            .collect();
        let refs: Vec<&NewTrade> = trades.iter().collect();
        let rankings: HashMap<String, TraderRanking> = (0..3)
            .map(|i| (format!("0xt{i}"), make_ranking(&format!("0xt{i}"), i + 1)))
            .collect();

        let mut budget = 2;
        let selected =
            select_copyable(&refs, &rankings, &HashSet::new(), &mut budget, &config, now);
        assert_eq!(selected.len(), 2);
        assert_eq!(budget, 0);

        // Exhausted budget blocks the isolated stage too.
        let candidates = select_isolated_candidates(&refs, &HashMap::new(), &config, now);
        let confirmed: HashSet<String> = candidates.iter().map(|t| t.tx_hash.clone()).collect();
        assert!(take_confirmed(&candidates, &confirmed, &mut budget).is_empty());
    }

    #[test]
    fn one_copyable_alert_per_trader_per_page() {
        let config = test_config();
        let now = Utc::now();
        let trades = vec![
            make_trade("0xh1", "0xsame", 5_000, "0.60"),
            make_trade("0xh2", "0xsame", 8_000, "0.55"),
        ];
        let refs: Vec<&NewTrade> = trades.iter().collect();
        let rankings: HashMap<String, TraderRanking> =
            [("0xsame".to_string(), make_ranking("0xsame", 3))].into();

        let mut budget = 10;
        let selected =
            select_copyable(&refs, &rankings, &HashSet::new(), &mut budget, &config, now);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0.tx_hash, "0xh1");
    }

    #[test]
    fn cooldown_blocks_copyable_selection() {
        let config = test_config();
        let now = Utc::now();
        let trades = vec![make_trade("0xh1", "0xcool", 5_000, "0.60")];
        let refs: Vec<&NewTrade> = trades.iter().collect();
        let rankings: HashMap<String, TraderRanking> =
            [("0xcool".to_string(), make_ranking("0xcool", 3))].into();
        let on_cooldown: HashSet<String> = ["0xcool".to_string()].into();

        let mut budget = 10;
        let selected = select_copyable(&refs, &rankings, &on_cooldown, &mut budget, &config, now);
        assert!(selected.is_empty());
        assert_eq!(budget, 10);
    }

    #[test]
    fn copyable_traders_are_not_isolated_candidates() {
        let config = test_config();
        let now = Utc::now();
        let trades = vec![
            make_trade("0xh1", "0xranked", 20_000, "0.60"),
            make_trade("0xh2", "0xnobody", 20_000, "0.60"),
            make_trade("0xh3", "0xnobody", 100, "0.60"), // below floor
        ];
        let refs: Vec<&NewTrade> = trades.iter().collect();
        let rankings: HashMap<String, TraderRanking> =
            [("0xranked".to_string(), make_ranking("0xranked", 3))].into();

        let candidates = select_isolated_candidates(&refs, &rankings, &config, now);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tx_hash, "0xh2");
    }
}
