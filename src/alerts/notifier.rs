use serde_json::json;

use crate::ingestion::normalizer::TradeMeta;
use crate::models::{NewTrade, TraderRanking};
use crate::polymarket::{league_event_slug, league_prefix};

/// Telegram notification channel. Failures are logged but never block the
/// ingestion run.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    /// Send a Telegram message. Returns whether the channel accepted it,
    /// so the caller can flip the alert's sent flag; failures are logged
    /// as warnings and swallowed.
    pub async fn send(&self, message: &str) -> bool {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    true
                } else {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                    false
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
                false
            }
        }
    }
}

/// Build the human deep link for a trade.
///
/// The event slug from the feed is authoritative when present. Otherwise
/// a league-prefixed game slug reconstructs the sports page, and any other
/// market slug falls back to the generic event URL.
pub fn deep_link(meta: Option<&TradeMeta>, market_slug: Option<&str>) -> String {
    if let Some(event_slug) = meta.and_then(|m| m.event_slug.as_deref()) {
        return format!("https://polymarket.com/event/{event_slug}");
    }

    match market_slug {
        Some(slug) => match (league_prefix(slug), league_event_slug(slug)) {
            (Some(league), Some(game)) => {
                format!("https://polymarket.com/sports/{league}/game/{game}")
            }
            _ => format!("https://polymarket.com/event/{slug}"),
        },
        None => "https://polymarket.com/markets".to_string(),
    }
}

/// Shorten a wallet address for display: 0x1234...abcd.
pub fn short_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

/// Display handle for a trader: feed display name when known, shortened
/// address otherwise.
pub fn trader_handle(meta: Option<&TradeMeta>, address: &str) -> String {
    meta.and_then(|m| m.display_name.clone())
        .unwrap_or_else(|| short_address(address))
}

/// Format a copyable-whale alert message.
pub fn format_copyable(trade: &NewTrade, ranking: &TraderRanking, handle: &str) -> String {
    format!(
        "*Copyable Whale*\nTrader: `{}`\nRank: #{} ({}W/{}L)\nROI: {}%\nP/L: ${}\nMedian bet: ${}\n{} {} ${} @ {}\nMarket: {}",
        handle,
        ranking.rank,
        ranking.wins,
        ranking.losses,
        ranking.roi.round_dp(1),
        ranking.realized_pnl.round_dp(0),
        ranking.median_bet.round_dp(0),
        trade.side,
        trade.outcome.as_deref().unwrap_or("?"),
        trade.amount.round_dp(0),
        trade.price,
        trade.market_title.as_deref().unwrap_or(&trade.condition_id),
    )
}

/// Format an isolated-contact alert message.
pub fn format_isolated(trade: &NewTrade, handle: &str) -> String {
    format!(
        "*Isolated Contact*\nTrader: `{}`\n{} {} ${} @ {}\nMarket: {}",
        handle,
        trade.side,
        trade.outcome.as_deref().unwrap_or("?"),
        trade.amount.round_dp(0),
        trade.price,
        trade.market_title.as_deref().unwrap_or(&trade.condition_id),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
