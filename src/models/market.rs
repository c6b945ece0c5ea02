use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the markets table.
///
/// `checked_at` is a rotation marker — the last time the resolution sync
/// looked at this market, not the last time the row changed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub condition_id: String,
    pub slug: Option<String>,
    pub question: Option<String>,
    pub resolved: bool,
    pub winning_outcome: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
