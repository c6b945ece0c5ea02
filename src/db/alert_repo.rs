use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::NewAlert;

/// Insert alerts keyed by trade hash, ignoring duplicates.
///
/// Returns the hashes of the rows that were actually inserted — the only
/// way a caller can know an alert is new. A trade alerted by a prior run
/// conflicts here and produces no outbound notification.
pub async fn insert_alerts(pool: &PgPool, alerts: &[NewAlert]) -> anyhow::Result<Vec<String>> {
    if alerts.is_empty() {
        return Ok(Vec::new());
    }

    let tx_hashes: Vec<String> = alerts.iter().map(|a| a.tx_hash.clone()).collect();
    let kinds: Vec<String> = alerts.iter().map(|a| a.kind.as_str().to_string()).collect();
    let messages: Vec<String> = alerts.iter().map(|a| a.message.clone()).collect();

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        INSERT INTO alerts (tx_hash, kind, message)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
        ON CONFLICT (tx_hash) DO NOTHING
        RETURNING tx_hash
        "#,
    )
    .bind(&tx_hashes)
    .bind(&kinds)
    .bind(&messages)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Count alerts of either kind created since `since`. Feeds the shared
/// hourly budget.
pub async fn count_recent(pool: &PgPool, since: DateTime<Utc>) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM alerts WHERE created_at >= $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// True if the trader already received a copyable alert since `since`.
pub async fn has_recent_copyable(
    pool: &PgPool,
    trader: &str,
    since: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let row: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM alerts a
            JOIN trades t ON t.tx_hash = a.tx_hash
            WHERE a.kind = 'copyable' AND t.trader = $1 AND a.created_at >= $2
        )
        "#,
    )
    .bind(trader)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Mark an alert as delivered to the outbound channel.
pub async fn mark_sent(pool: &PgPool, tx_hash: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE alerts SET sent = TRUE WHERE tx_hash = $1")
        .bind(tx_hash)
        .execute(pool)
        .await?;

    Ok(())
}
