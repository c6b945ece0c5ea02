use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::NewTrade;

/// Upsert one page of trades keyed by transaction hash.
///
/// The page must already be deduplicated by hash — a single statement
/// cannot apply two conflicting updates to the same key. Re-inserting an
/// already-stored hash is a no-op, which is what makes re-fetching an
/// unchanged page idempotent. Returns the number of rows actually stored.
pub async fn upsert_trades(pool: &PgPool, trades: &[NewTrade]) -> anyhow::Result<u64> {
    if trades.is_empty() {
        return Ok(0);
    }

    let mut tx_hashes: Vec<String> = Vec::with_capacity(trades.len());
    let mut condition_ids: Vec<String> = Vec::with_capacity(trades.len());
    let mut slugs: Vec<Option<String>> = Vec::with_capacity(trades.len());
    let mut titles: Vec<Option<String>> = Vec::with_capacity(trades.len());
    let mut traders: Vec<String> = Vec::with_capacity(trades.len());
    let mut outcomes: Vec<Option<String>> = Vec::with_capacity(trades.len());
    let mut sides: Vec<String> = Vec::with_capacity(trades.len());
    let mut sizes: Vec<Decimal> = Vec::with_capacity(trades.len());
    let mut prices: Vec<Decimal> = Vec::with_capacity(trades.len());
    let mut amounts: Vec<Decimal> = Vec::with_capacity(trades.len());
    let mut traded_ats: Vec<DateTime<Utc>> = Vec::with_capacity(trades.len());

    for t in trades {
        tx_hashes.push(t.tx_hash.clone());
        condition_ids.push(t.condition_id.clone());
        slugs.push(t.market_slug.clone());
        titles.push(t.market_title.clone());
        traders.push(t.trader.clone());
        outcomes.push(t.outcome.clone());
        sides.push(t.side.as_str().to_string());
        sizes.push(t.size);
        prices.push(t.price);
        amounts.push(t.amount);
        traded_ats.push(t.traded_at);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO trades (tx_hash, condition_id, market_slug, market_title, trader, outcome, side, size, price, amount, traded_at)
        SELECT * FROM UNNEST(
            $1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[],
            $7::text[], $8::numeric[], $9::numeric[], $10::numeric[], $11::timestamptz[]
        )
        ON CONFLICT (tx_hash) DO NOTHING
        "#,
    )
    .bind(&tx_hashes)
    .bind(&condition_ids)
    .bind(&slugs)
    .bind(&titles)
    .bind(&traders)
    .bind(&outcomes)
    .bind(&sides)
    .bind(&sizes)
    .bind(&prices)
    .bind(&amounts)
    .bind(&traded_ats)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Distinct market ids traded since `since`, newest activity first.
pub async fn recent_market_ids(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT condition_id FROM trades
        WHERE traded_at >= $1
        GROUP BY condition_id
        ORDER BY MAX(traded_at) DESC
        LIMIT $2
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Distinct market slugs traded since `since`. Used by the events-recent
/// resolution mode to reconstruct event slugs; league filtering happens in
/// the caller.
pub async fn recent_market_slugs(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT market_slug FROM trades
        WHERE traded_at >= $1 AND market_slug IS NOT NULL
        GROUP BY market_slug
        ORDER BY MAX(traded_at) DESC
        LIMIT $2
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}
