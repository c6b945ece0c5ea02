use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the trader_rankings snapshot table.
///
/// The snapshot is computed by the store's own aggregation job; the core
/// only reads it, and must check `computed_at` against the staleness
/// window before trusting a row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TraderRanking {
    pub trader: String,
    pub rank: i32,
    pub roi: Decimal,
    pub realized_pnl: Decimal,
    pub median_bet: Decimal,
    pub wins: i32,
    pub losses: i32,
    pub computed_at: DateTime<Utc>,
}
