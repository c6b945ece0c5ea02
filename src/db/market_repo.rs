use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::Market;

/// Placeholder upsert for markets referenced by a trade page.
///
/// Fills slug/question only where they are currently missing and never
/// touches the resolution fields — a market resolved by the sync must not
/// be disturbed by ingestion.
pub async fn ensure_markets(
    pool: &PgPool,
    markets: &[(String, Option<String>, Option<String>)],
) -> anyhow::Result<()> {
    for (condition_id, slug, question) in markets {
        sqlx::query(
            r#"
            INSERT INTO markets (condition_id, slug, question)
            VALUES ($1, $2, $3)
            ON CONFLICT (condition_id) DO UPDATE
            SET slug = COALESCE(markets.slug, EXCLUDED.slug),
                question = COALESCE(markets.question, EXCLUDED.question),
                updated_at = NOW()
            "#,
        )
        .bind(condition_id)
        .bind(slug)
        .bind(question)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Persist a resolution verdict that carries a winner.
///
/// The `NOT resolved` guard means an already-resolved market is never
/// rewritten, let alone downgraded.
pub async fn mark_resolved(
    pool: &PgPool,
    condition_id: &str,
    winning_outcome: &str,
    slug: Option<&str>,
    question: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE markets
        SET resolved = TRUE,
            winning_outcome = $2,
            resolved_at = NOW(),
            slug = COALESCE($3, slug),
            question = COALESCE($4, question),
            checked_at = NOW(),
            updated_at = NOW()
        WHERE condition_id = $1 AND NOT resolved
        "#,
    )
    .bind(condition_id)
    .bind(winning_outcome)
    .bind(slug)
    .bind(question)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Rotate an unresolved market to the back of the due queue, refreshing
/// the denormalized slug/question opportunistically.
pub async fn touch_checked(
    pool: &PgPool,
    condition_id: &str,
    slug: Option<&str>,
    question: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE markets
        SET checked_at = NOW(),
            slug = COALESCE($2, slug),
            question = COALESCE($3, question),
            updated_at = NOW()
        WHERE condition_id = $1
        "#,
    )
    .bind(condition_id)
    .bind(slug)
    .bind(question)
    .execute(pool)
    .await?;

    Ok(())
}

/// Unresolved markets whose last check is older than `older_than` (or that
/// were never checked), oldest check first. Markets that stop trading long
/// before upstream marks them resolved are only reachable through this
/// queue, not through trade recency.
pub async fn get_due_markets(
    pool: &PgPool,
    older_than: DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<Market>> {
    let rows = sqlx::query_as::<_, Market>(
        r#"
        SELECT * FROM markets
        WHERE resolved = FALSE AND (checked_at IS NULL OR checked_at < $1)
        ORDER BY checked_at ASC NULLS FIRST
        LIMIT $2
        "#,
    )
    .bind(older_than)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// All unresolved markets, oldest check first. Backfill mode.
pub async fn get_unresolved_markets(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<Market>> {
    let rows = sqlx::query_as::<_, Market>(
        r#"
        SELECT * FROM markets
        WHERE resolved = FALSE
        ORDER BY checked_at ASC NULLS FIRST
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch a single market row by condition id.
pub async fn get_market(pool: &PgPool, condition_id: &str) -> anyhow::Result<Option<Market>> {
    let row = sqlx::query_as::<_, Market>(
        "SELECT * FROM markets WHERE condition_id = $1",
    )
    .bind(condition_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetch market rows for a set of condition ids.
pub async fn get_markets_by_ids(
    pool: &PgPool,
    condition_ids: &[String],
) -> anyhow::Result<Vec<Market>> {
    let rows = sqlx::query_as::<_, Market>(
        "SELECT * FROM markets WHERE condition_id = ANY($1)",
    )
    .bind(condition_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
