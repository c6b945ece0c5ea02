use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::Side;

/// A validated, canonical trade row ready for the keyed upsert.
///
/// `amount` is always size × price; rows that fail validation never reach
/// this type. Trades are immutable after insert, so nothing reads them
/// back as a struct — the hash-keyed upsert is the whole write surface.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub tx_hash: String,
    pub condition_id: String,
    pub market_slug: Option<String>,
    pub market_title: Option<String>,
    pub trader: String,
    pub outcome: Option<String>,
    pub side: Side,
    pub size: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
    pub traded_at: DateTime<Utc>,
}
