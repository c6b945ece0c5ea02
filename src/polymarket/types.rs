use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Trade feed record (Data API)
// ---------------------------------------------------------------------------

/// One raw record from the paginated trade feed. Every field is optional —
/// the feed omits or retypes fields freely, so validation happens in the
/// normalizer, not here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedTrade {
    #[serde(default, alias = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(default, alias = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "proxyWallet")]
    pub proxy_wallet: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    /// Unix seconds or millis, as a JSON number or string.
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pseudonym: Option<String>,
    #[serde(default, alias = "eventSlug")]
    pub event_slug: Option<String>,
}

// ---------------------------------------------------------------------------
// Market descriptor (Gamma API)
// ---------------------------------------------------------------------------

/// Market descriptor from the Gamma API. The schema is loose: every field
/// is optional and defaulted, and array-valued fields arrive as stringified
/// JSON. The resolution decision logic lives in one place
/// (`resolution::decision`) rather than scattering presence checks.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GammaMarket {
    #[serde(default, alias = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub resolved: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, alias = "umaResolutionStatus")]
    pub uma_resolution_status: Option<String>,
    /// Stringified JSON array of per-leg statuses on neg-risk markets.
    #[serde(default, alias = "umaResolutionStatuses")]
    pub uma_resolution_statuses: Option<String>,
    /// Stringified JSON array of outcome labels, e.g. `["Yes","No"]`.
    #[serde(default)]
    pub outcomes: Option<String>,
    /// Stringified JSON array of outcome prices, e.g. `["0.999","0.001"]`.
    #[serde(default, alias = "outcomePrices")]
    pub outcome_prices: Option<String>,
    #[serde(default, alias = "winningOutcome")]
    pub winning_outcome: Option<String>,
    #[serde(default, alias = "closedTime")]
    pub closed_time: Option<String>,
    #[serde(default, alias = "endDateIso")]
    pub end_date_iso: Option<String>,
}

impl GammaMarket {
    /// Parse the stringified outcomes array.
    pub fn parse_outcomes(&self) -> Vec<String> {
        parse_json_array(self.outcomes.as_deref())
    }

    /// Parse the stringified outcome-price array. Prices arrive as strings;
    /// unparseable entries drop the whole vector since a partial price
    /// vector cannot be judged settled.
    pub fn parse_outcome_prices(&self) -> Option<Vec<Decimal>> {
        let raw = parse_json_array(self.outcome_prices.as_deref());
        if raw.is_empty() {
            return None;
        }
        raw.iter()
            .map(|s| Decimal::from_str(s).ok())
            .collect::<Option<Vec<_>>>()
    }

    /// All resolution-status strings present on the descriptor.
    pub fn resolution_statuses(&self) -> Vec<String> {
        let mut statuses: Vec<String> = self
            .uma_resolution_status
            .iter()
            .cloned()
            .collect();
        statuses.extend(parse_json_array(self.uma_resolution_statuses.as_deref()));
        statuses
    }
}

fn parse_json_array(s: Option<&str>) -> Vec<String> {
    s.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Slug heuristics
// ---------------------------------------------------------------------------

/// League prefixes whose market slugs follow the
/// `{league}-{away}-{home}-{yyyy-mm-dd}` game convention.
const LEAGUE_PREFIXES: &[&str] = &["nba", "nfl", "mlb", "nhl", "cfb", "epl", "ucl"];

/// Reconstruct the event (game) slug from a league-prefixed market slug.
///
/// Game events carry one slug per game; their per-leg market slugs start
/// with the game slug and may append market-specific segments. Cutting at
/// the date triple recovers the event slug without an upstream lookup.
/// Returns None for non-league or non-game-shaped slugs.
pub fn league_event_slug(market_slug: &str) -> Option<String> {
    let segments: Vec<&str> = market_slug.split('-').collect();
    if segments.len() < 4 || !LEAGUE_PREFIXES.contains(&segments[0]) {
        return None;
    }

    // Find the yyyy-mm-dd triple; everything through it is the game slug.
    for i in 1..segments.len().saturating_sub(2) {
        if is_digits(segments[i], 4) && is_digits(segments[i + 1], 2) && is_digits(segments[i + 2], 2)
        {
            return Some(segments[..=i + 2].join("-"));
        }
    }

    None
}

/// The league prefix of a game-shaped market slug, if any.
pub fn league_prefix(market_slug: &str) -> Option<&str> {
    let prefix = market_slug.split('-').next()?;
    LEAGUE_PREFIXES
        .iter()
        .find(|l| **l == prefix)
        .copied()
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Event descriptor (Gamma API)
// ---------------------------------------------------------------------------

/// Event descriptor grouping the markets that share one event slug.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GammaEvent {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}
