use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::models::TraderRanking;

/// Read the ranking snapshot rows for a set of trader addresses.
///
/// The snapshot is maintained by the store's own aggregation job; callers
/// must check `computed_at` before trusting it.
pub async fn get_rankings(
    pool: &PgPool,
    traders: &[String],
) -> anyhow::Result<Vec<TraderRanking>> {
    if traders.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, TraderRanking>(
        "SELECT * FROM trader_rankings WHERE trader = ANY($1)",
    )
    .bind(traders)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// One isolated-contact candidate handed to the store's batched check.
#[derive(Debug, Clone, Serialize)]
pub struct IsolatedCandidate {
    pub tx_hash: String,
    pub trader: String,
    pub condition_id: String,
    pub amount: Decimal,
}

/// Batched isolated-contact eligibility check.
///
/// The store evaluates three joint conditions per candidate — the trader
/// trades rarely in a rolling window, the market is thin in a rolling
/// window, and the size is outsized relative to the market's average —
/// and returns the hashes of the candidates that pass all three.
pub async fn check_isolated_contacts(
    pool: &PgPool,
    candidates: &[IsolatedCandidate],
) -> anyhow::Result<Vec<String>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let payload = serde_json::to_value(candidates)?;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tx_hash FROM check_isolated_contacts($1::jsonb)",
    )
    .bind(payload)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Recompute the trader ranking snapshot. Best-effort — callers log and
/// continue on failure.
pub async fn refresh_trader_rankings(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT refresh_trader_rankings()")
        .execute(pool)
        .await?;

    Ok(())
}

/// Refresh the store's market-stats cache. Best-effort.
pub async fn refresh_market_stats(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT refresh_market_stats()")
        .execute(pool)
        .await?;

    Ok(())
}
