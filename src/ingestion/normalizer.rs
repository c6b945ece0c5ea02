use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{NewTrade, Side};
use crate::polymarket::FeedTrade;

/// Why a raw feed record was rejected.
///
/// Checks run in a fixed order and the first failure wins, so every
/// rejected record is counted under exactly one reason even when several
/// checks would fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingTxHash,
    MissingMarket,
    MissingTrader,
    BadTimestamp,
    BadAmount,
    BelowMinimum,
}

/// Per-reason rejection tallies, reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DropCounts {
    pub missing_tx_hash: u32,
    pub missing_market: u32,
    pub missing_trader: u32,
    pub bad_timestamp: u32,
    pub bad_amount: u32,
    pub below_minimum: u32,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingTxHash => self.missing_tx_hash += 1,
            DropReason::MissingMarket => self.missing_market += 1,
            DropReason::MissingTrader => self.missing_trader += 1,
            DropReason::BadTimestamp => self.bad_timestamp += 1,
            DropReason::BadAmount => self.bad_amount += 1,
            DropReason::BelowMinimum => self.below_minimum += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.missing_tx_hash
            + self.missing_market
            + self.missing_trader
            + self.bad_timestamp
            + self.bad_amount
            + self.below_minimum
    }
}

/// Sidecar metadata for notification formatting, keyed by tx hash.
/// Never persisted.
#[derive(Debug, Clone, Default)]
pub struct TradeMeta {
    pub display_name: Option<String>,
    pub event_slug: Option<String>,
}

/// Turn one raw feed record into a canonical trade row, or reject it with
/// its first failing check.
pub fn normalize_row(raw: &FeedTrade, min_trade_size: Decimal) -> Result<NewTrade, DropReason> {
    let tx_hash = non_empty(raw.transaction_hash.as_deref()).ok_or(DropReason::MissingTxHash)?;
    let condition_id = non_empty(raw.condition_id.as_deref()).ok_or(DropReason::MissingMarket)?;
    let trader = non_empty(raw.proxy_wallet.as_deref()).ok_or(DropReason::MissingTrader)?;
    let traded_at = parse_timestamp(raw.timestamp.as_ref()).ok_or(DropReason::BadTimestamp)?;

    let notional = raw.size.unwrap_or(f64::NAN) * raw.price.unwrap_or(f64::NAN);
    if !notional.is_finite() {
        return Err(DropReason::BadAmount);
    }
    let amount = Decimal::from_f64(notional).ok_or(DropReason::BadAmount)?;
    if amount < min_trade_size {
        return Err(DropReason::BelowMinimum);
    }

    let side = raw
        .side
        .as_deref()
        .and_then(Side::from_api_str)
        .unwrap_or(Side::Buy);

    Ok(NewTrade {
        tx_hash: tx_hash.to_string(),
        condition_id: condition_id.to_string(),
        market_slug: non_empty(raw.slug.as_deref()).map(str::to_string),
        market_title: non_empty(raw.title.as_deref()).map(str::to_string),
        trader: trader.to_string(),
        outcome: non_empty(raw.outcome.as_deref()).map(str::to_string),
        side,
        size: Decimal::from_f64(raw.size.unwrap_or(0.0)).unwrap_or(Decimal::ZERO),
        price: Decimal::from_f64(raw.price.unwrap_or(0.0)).unwrap_or(Decimal::ZERO),
        amount,
        traded_at,
    })
}

/// Record the per-hash display metadata the notifier uses later. Prefers
/// the trader's display name over the venue-assigned pseudonym.
pub fn record_meta(lookup: &mut HashMap<String, TradeMeta>, raw: &FeedTrade, trade: &NewTrade) {
    lookup.insert(
        trade.tx_hash.clone(),
        TradeMeta {
            display_name: non_empty(raw.name.as_deref())
                .or_else(|| non_empty(raw.pseudonym.as_deref()))
                .map(str::to_string),
            event_slug: non_empty(raw.event_slug.as_deref()).map(str::to_string),
        },
    );
}

/// Collapse repeated hashes within one page, keeping the first occurrence.
/// The keyed upsert cannot apply two conflicting rows in one statement;
/// cross-page repeats are handled by the upsert itself.
pub fn dedup_page(trades: Vec<NewTrade>) -> Vec<NewTrade> {
    let mut seen: HashSet<String> = HashSet::with_capacity(trades.len());
    trades
        .into_iter()
        .filter(|t| seen.insert(t.tx_hash.clone()))
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Parse the feed's timestamp field: unix seconds or millis, as a JSON
/// number or string, with RFC 3339 strings as a fallback.
fn parse_timestamp(ts: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| match t {
        serde_json::Value::Number(n) => {
            let secs = n.as_i64()?;
            from_unix(secs)
        }
        serde_json::Value::String(s) => {
            if let Ok(secs) = s.parse::<i64>() {
                return from_unix(secs);
            }
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    })
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    // If >1e12, it's milliseconds
    if secs > 1_000_000_000_000 {
        chrono::DateTime::from_timestamp(secs / 1000, ((secs % 1000) * 1_000_000) as u32)
    } else {
        chrono::DateTime::from_timestamp(secs, 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_trade() -> FeedTrade {
        FeedTrade {
            transaction_hash: Some("0xabc".into()),
            condition_id: Some("0xcond".into()),
            slug: Some("will-it-rain".into()),
            title: Some("Will it rain?".into()),
            proxy_wallet: Some("0xtrader".into()),
            outcome: Some("Yes".into()),
            side: Some("SELL".into()),
            size: Some(2000.0),
            price: Some(0.5),
            timestamp: Some(json!(1_700_000_000)),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_a_valid_record() {
        let trade = normalize_row(&raw_trade(), Decimal::from(500)).unwrap();
        assert_eq!(trade.tx_hash, "0xabc");
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.amount, Decimal::from(1000));
        assert_eq!(trade.traded_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn first_failing_check_wins() {
        // Missing trader AND below-minimum amount: the trader check runs
        // first, so that is the counted reason.
        let mut raw = raw_trade();
        raw.proxy_wallet = None;
        raw.size = Some(0.1);
        let err = normalize_row(&raw, Decimal::from(500)).unwrap_err();
        assert_eq!(err, DropReason::MissingTrader);
    }

    #[test]
    fn below_minimum_is_its_own_reason() {
        // Every earlier field present — the rejection must be BelowMinimum,
        // not masked by an earlier check.
        let mut raw = raw_trade();
        raw.size = Some(10.0); // amount = 5.0
        let err = normalize_row(&raw, Decimal::from(500)).unwrap_err();
        assert_eq!(err, DropReason::BelowMinimum);
    }

    #[test]
    fn missing_size_is_a_bad_amount() {
        let mut raw = raw_trade();
        raw.size = None;
        let err = normalize_row(&raw, Decimal::from(500)).unwrap_err();
        assert_eq!(err, DropReason::BadAmount);
    }

    #[test]
    fn empty_hash_counts_as_missing() {
        let mut raw = raw_trade();
        raw.transaction_hash = Some(String::new());
        let err = normalize_row(&raw, Decimal::from(500)).unwrap_err();
        assert_eq!(err, DropReason::MissingTxHash);
    }

    #[test]
    fn unparseable_timestamp_is_rejected() {
        let mut raw = raw_trade();
        raw.timestamp = Some(json!("not-a-time"));
        let err = normalize_row(&raw, Decimal::from(500)).unwrap_err();
        assert_eq!(err, DropReason::BadTimestamp);
    }

    #[test]
    fn millisecond_timestamps_parse() {
        let mut raw = raw_trade();
        raw.timestamp = Some(json!(1_700_000_000_500_i64));
        let trade = normalize_row(&raw, Decimal::from(500)).unwrap();
        assert_eq!(trade.traded_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_side_defaults_to_buy() {
        let mut raw = raw_trade();
        raw.side = None;
        let trade = normalize_row(&raw, Decimal::from(500)).unwrap();
        assert_eq!(trade.side, Side::Buy);
    }

    #[test]
    fn page_dedup_keeps_first_occurrence() {
        let first = normalize_row(&raw_trade(), Decimal::from(500)).unwrap();
        let mut second_raw = raw_trade();
        second_raw.side = Some("BUY".into());
        let second = normalize_row(&second_raw, Decimal::from(500)).unwrap();
        let other = {
            let mut raw = raw_trade();
            raw.transaction_hash = Some("0xdef".into());
            normalize_row(&raw, Decimal::from(500)).unwrap()
        };

        let deduped = dedup_page(vec![first, second, other]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].tx_hash, "0xabc");
        assert_eq!(deduped[0].side, Side::Sell);
        assert_eq!(deduped[1].tx_hash, "0xdef");
    }

    #[test]
    fn drop_counts_tally_by_reason() {
        let mut counts = DropCounts::default();
        counts.record(DropReason::BelowMinimum);
        counts.record(DropReason::BelowMinimum);
        counts.record(DropReason::MissingTxHash);
        assert_eq!(counts.below_minimum, 2);
        assert_eq!(counts.missing_tx_hash, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn meta_prefers_display_name_over_pseudonym() {
        let mut raw = raw_trade();
        raw.name = Some("TopDog".into());
        raw.pseudonym = Some("Quiet-Falcon".into());
        let trade = normalize_row(&raw, Decimal::from(500)).unwrap();

        let mut lookup = HashMap::new();
        record_meta(&mut lookup, &raw, &trade);
        assert_eq!(
            lookup.get("0xabc").unwrap().display_name.as_deref(),
            Some("TopDog")
        );
    }
}
