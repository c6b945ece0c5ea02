use rust_decimal::Decimal;

use crate::polymarket::GammaMarket;

/// A resolution verdict for one market descriptor, with the individual
/// signals kept for logging. Computed fresh per pass, never cached.
#[derive(Debug, Clone, Default)]
pub struct Verdict {
    pub resolved: bool,
    pub winning_outcome: Option<String>,
    pub explicit_resolved: bool,
    pub status_resolved: bool,
    pub explicit_winner: bool,
    pub settled_prices: bool,
}

// A price vector counts as settled only when every outcome sits at one of
// these rails.
const SETTLED_HIGH: Decimal = Decimal::from_parts(999, 0, 0, false, 3); // 0.999
const SETTLED_LOW: Decimal = Decimal::from_parts(1, 0, 0, false, 3); // 0.001

/// Decide whether a market descriptor represents a resolved market and,
/// if so, which outcome won.
///
/// Signals in order of trust: the explicit resolved flag, any
/// resolution-status enum equal to "resolved", an explicit winning-outcome
/// field, and finally the settled-price heuristic — which only counts when
/// the market is also marked closed. A verdict can be resolved without a
/// winner (the caller logs it and leaves the market untouched); only a
/// verdict carrying both is ever persisted.
pub fn decide(market: &GammaMarket) -> Verdict {
    let explicit_resolved = market.resolved == Some(true);
    let status_resolved = market
        .resolution_statuses()
        .iter()
        .any(|s| s.eq_ignore_ascii_case("resolved"));
    let explicit_winner = market
        .winning_outcome
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let closed = market.closed == Some(true);

    let prices = market.parse_outcome_prices();
    let settled = prices.as_deref().is_some_and(is_settled_vector);
    let derived_winner = if settled && closed {
        derive_winner(&market.parse_outcomes(), prices.as_deref().unwrap_or(&[]))
    } else {
        None
    };

    let resolved =
        explicit_resolved || status_resolved || explicit_winner.is_some() || (settled && closed);

    Verdict {
        resolved,
        winning_outcome: explicit_winner.clone().or(derived_winner),
        explicit_resolved,
        status_resolved,
        explicit_winner: explicit_winner.is_some(),
        settled_prices: settled,
    }
}

/// True when the outcome prices partition into ≈1.0 and ≈0.0 with no
/// outcome in between. [0.96, 0.04] is close but not settled.
fn is_settled_vector(prices: &[Decimal]) -> bool {
    !prices.is_empty()
        && prices
            .iter()
            .all(|p| *p >= SETTLED_HIGH || *p <= SETTLED_LOW)
}

/// The unique outcome at the maximum price. A tie at the maximum yields
/// no winner — an ambiguous winner is never guessed.
fn derive_winner(outcomes: &[String], prices: &[Decimal]) -> Option<String> {
    let max = prices.iter().max()?;
    let mut at_max = prices.iter().enumerate().filter(|(_, p)| *p == max);
    let (idx, _) = at_max.next()?;
    if at_max.next().is_some() {
        return None;
    }
    outcomes.get(idx).cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(prices: &str, outcomes: &str, closed: bool) -> GammaMarket {
        GammaMarket {
            condition_id: Some("0xcond".into()),
            outcome_prices: Some(prices.into()),
            outcomes: Some(outcomes.into()),
            closed: Some(closed),
            ..Default::default()
        }
    }

    #[test]
    fn settled_closed_vector_resolves_with_winner() {
        let market = descriptor(r#"["0.999","0.001"]"#, r#"["Yes","No"]"#, true);
        let verdict = decide(&market);
        assert!(verdict.resolved);
        assert!(verdict.settled_prices);
        assert_eq!(verdict.winning_outcome.as_deref(), Some("Yes"));
    }

    #[test]
    fn near_settled_vector_is_not_enough() {
        let market = descriptor(r#"["0.96","0.04"]"#, r#"["Yes","No"]"#, true);
        let verdict = decide(&market);
        assert!(!verdict.resolved);
        assert!(verdict.winning_outcome.is_none());
    }

    #[test]
    fn settled_vector_on_open_market_does_not_resolve() {
        let market = descriptor(r#"["0.999","0.001"]"#, r#"["Yes","No"]"#, false);
        let verdict = decide(&market);
        assert!(!verdict.resolved);
        assert!(verdict.settled_prices);
        assert!(verdict.winning_outcome.is_none());
    }

    #[test]
    fn tied_maxima_yield_no_winner() {
        // Both legs at the high rail: settled, but the winner is ambiguous
        // and never guessed — the market stays unresolved downstream
        // because a winnerless verdict is not persisted.
        let market = descriptor(r#"["0.999","0.999"]"#, r#"["Yes","No"]"#, true);
        let verdict = decide(&market);
        assert!(verdict.resolved);
        assert!(verdict.winning_outcome.is_none());
    }

    #[test]
    fn explicit_resolved_flag_wins_without_prices() {
        let market = GammaMarket {
            resolved: Some(true),
            ..Default::default()
        };
        let verdict = decide(&market);
        assert!(verdict.resolved);
        assert!(verdict.explicit_resolved);
        assert!(verdict.winning_outcome.is_none());
    }

    #[test]
    fn status_enum_resolves() {
        let market = GammaMarket {
            uma_resolution_status: Some("RESOLVED".into()),
            ..Default::default()
        };
        let verdict = decide(&market);
        assert!(verdict.resolved);
        assert!(verdict.status_resolved);
    }

    #[test]
    fn explicit_winner_beats_heuristic() {
        let mut market = descriptor(r#"["0.999","0.001"]"#, r#"["Yes","No"]"#, true);
        market.winning_outcome = Some("No".into());
        let verdict = decide(&market);
        assert!(verdict.resolved);
        assert_eq!(verdict.winning_outcome.as_deref(), Some("No"));
    }

    #[test]
    fn three_way_settled_vector_picks_the_high_leg() {
        let market = descriptor(
            r#"["0.001","0.999","0.001"]"#,
            r#"["Alpha","Bravo","Charlie"]"#,
            true,
        );
        let verdict = decide(&market);
        assert!(verdict.resolved);
        assert_eq!(verdict.winning_outcome.as_deref(), Some("Bravo"));
    }

    #[test]
    fn middling_leg_spoils_the_vector() {
        let market = descriptor(
            r#"["0.999","0.5","0.001"]"#,
            r#"["Alpha","Bravo","Charlie"]"#,
            true,
        );
        let verdict = decide(&market);
        assert!(!verdict.settled_prices);
        assert!(!verdict.resolved);
    }

    #[test]
    fn empty_descriptor_is_unresolved() {
        let verdict = decide(&GammaMarket::default());
        assert!(!verdict.resolved);
        assert!(verdict.winning_outcome.is_none());
    }
}
