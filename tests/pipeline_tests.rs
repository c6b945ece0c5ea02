use rust_decimal::Decimal;
use serde_json::json;

use whalewatch::ingestion::normalizer::{self, DropCounts, DropReason};
use whalewatch::models::Side;
use whalewatch::polymarket::FeedTrade;
use whalewatch::resolution::decision;

fn feed_page(raw: serde_json::Value) -> Vec<FeedTrade> {
    serde_json::from_value(raw).expect("feed page should deserialize")
}

#[test]
fn feed_page_normalizes_with_exclusive_drop_reasons() {
    // A realistic page: one good row, one duplicate hash, one row missing
    // its trader, one row below the minimum size.
    let page = feed_page(json!([
        {
            "transactionHash": "0xaaa",
            "conditionId": "0xcond1",
            "slug": "will-it-rain",
            "title": "Will it rain?",
            "proxyWallet": "0xtrader1",
            "outcome": "Yes",
            "side": "buy",
            "size": 4000.0,
            "price": 0.5,
            "timestamp": 1700000000,
            "eventSlug": "weather-week"
        },
        {
            "transactionHash": "0xaaa",
            "conditionId": "0xcond1",
            "proxyWallet": "0xtrader1",
            "side": "SELL",
            "size": 4000.0,
            "price": 0.5,
            "timestamp": 1700000000
        },
        {
            "transactionHash": "0xbbb",
            "conditionId": "0xcond2",
            "size": 4000.0,
            "price": 0.5,
            "timestamp": 1700000000
        },
        {
            "transactionHash": "0xccc",
            "conditionId": "0xcond2",
            "proxyWallet": "0xtrader2",
            "size": 10.0,
            "price": 0.5,
            "timestamp": 1700000000
        }
    ]));

    let min = Decimal::from(500);
    let mut counts = DropCounts::default();
    let mut valid = Vec::new();
    for raw in &page {
        match normalizer::normalize_row(raw, min) {
            Ok(trade) => valid.push(trade),
            Err(reason) => counts.record(reason),
        }
    }

    assert_eq!(valid.len(), 2);
    assert_eq!(counts.missing_trader, 1);
    assert_eq!(counts.below_minimum, 1);
    assert_eq!(counts.total(), 2);

    // Two raw records sharing one hash yield exactly one row, first wins.
    let deduped = normalizer::dedup_page(valid);
    assert_eq!(deduped.len(), 1);
    assert_eq!(deduped[0].tx_hash, "0xaaa");
    assert_eq!(deduped[0].side, Side::Buy);
    assert_eq!(deduped[0].amount, Decimal::from(2000));
}

#[test]
fn settled_price_vector_resolves_only_when_unanimous_and_closed() {
    let settled = feed_market(r#"["0.999","0.001"]"#, true);
    let verdict = decision::decide(&settled);
    assert!(verdict.resolved);
    assert_eq!(verdict.winning_outcome.as_deref(), Some("Yes"));

    let lopsided = feed_market(r#"["0.96","0.04"]"#, true);
    let verdict = decision::decide(&lopsided);
    assert!(!verdict.resolved, "0.96 is not unanimous enough");

    let open = feed_market(r#"["0.999","0.001"]"#, false);
    assert!(!decision::decide(&open).resolved);
}

#[test]
fn tied_settled_vector_never_guesses_a_winner() {
    let tied = feed_market(r#"["0.999","0.999"]"#, true);
    let verdict = decision::decide(&tied);
    assert!(verdict.winning_outcome.is_none());
}

fn feed_market(prices: &str, closed: bool) -> whalewatch::polymarket::GammaMarket {
    serde_json::from_value(json!({
        "conditionId": "0xcond",
        "question": "Will it rain?",
        "outcomes": r#"["Yes","No"]"#,
        "outcomePrices": prices,
        "closed": closed
    }))
    .expect("descriptor should deserialize")
}

#[test]
fn drop_reason_equality_is_usable_in_reports() {
    // DropReason is a closed set; the report tallies one per rejection.
    let mut counts = DropCounts::default();
    counts.record(DropReason::BadTimestamp);
    counts.record(DropReason::BadAmount);
    assert_eq!(counts.bad_timestamp, 1);
    assert_eq!(counts.bad_amount, 1);
}
