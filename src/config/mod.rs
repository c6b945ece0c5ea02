use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Ingestion
    pub page_size: u32,
    pub max_pages: u32,
    pub min_trade_size: Decimal,

    // Copyable alerts
    pub copyable_rank_cutoff: i32,
    pub copyable_min_roi: Decimal,
    pub copyable_min_pnl: Decimal,
    pub copyable_min_median_bet: Decimal,
    pub copyable_min_amount: Decimal,
    pub copyable_cooldown_hours: i64,
    pub ranking_staleness_hours: i64,

    // Shared hourly alert budget (both kinds)
    pub alerts_per_hour: i64,

    // Isolated-contact alerts
    pub isolated_min_amount: Decimal,
    pub isolated_min_amount_extreme: Decimal,
    pub isolated_extreme_price: Decimal,

    // Trades priced at or beyond this band never alert
    pub extreme_price_band: Decimal,

    // Resolution sync
    pub recheck_hours: i64,
    pub lookback_days: i64,
    pub resolution_batch_size: usize,

    // Interval schedulers; 0 disables the loop
    pub ingest_interval_secs: u64,
    pub resolution_interval_secs: u64,

    // Telegram channel (optional — dispatch is disabled when unset)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            page_size: env_parse("PAGE_SIZE", 500),
            max_pages: env_parse("MAX_PAGES", 10),
            min_trade_size: env_decimal("MIN_TRADE_SIZE", "500"),

            copyable_rank_cutoff: env_parse("COPYABLE_RANK_CUTOFF", 50),
            copyable_min_roi: env_decimal("COPYABLE_MIN_ROI", "10"),
            copyable_min_pnl: env_decimal("COPYABLE_MIN_PNL", "1000"),
            copyable_min_median_bet: env_decimal("COPYABLE_MIN_MEDIAN_BET", "100"),
            copyable_min_amount: env_decimal("COPYABLE_MIN_AMOUNT", "1000"),
            copyable_cooldown_hours: env_parse("COPYABLE_COOLDOWN_HOURS", 6),
            ranking_staleness_hours: env_parse("RANKING_STALENESS_HOURS", 26),

            alerts_per_hour: env_parse("ALERTS_PER_HOUR", 10),

            isolated_min_amount: env_decimal("ISOLATED_MIN_AMOUNT", "5000"),
            isolated_min_amount_extreme: env_decimal("ISOLATED_MIN_AMOUNT_EXTREME", "15000"),
            isolated_extreme_price: env_decimal("ISOLATED_EXTREME_PRICE", "0.90"),

            extreme_price_band: env_decimal("EXTREME_PRICE_BAND", "0.95"),

            recheck_hours: env_parse("RECHECK_HOURS", 12),
            lookback_days: env_parse("LOOKBACK_DAYS", 7),
            resolution_batch_size: env_parse("RESOLUTION_BATCH_SIZE", 5),

            ingest_interval_secs: env_parse("INGEST_INTERVAL_SECS", 0),
            resolution_interval_secs: env_parse("RESOLUTION_INTERVAL_SECS", 0),

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").ok(),
        })
    }

    /// Returns true if the Telegram channel is fully configured.
    pub fn has_telegram(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: &str) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| Decimal::from_str(&v).ok())
        .unwrap_or_else(|| Decimal::from_str(default).expect("valid default decimal"))
}
