use reqwest::Client;
use thiserror::Error;

use super::types::{GammaEvent, GammaMarket};

const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

#[derive(Debug, Error)]
pub enum GammaClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
}

impl GammaClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: GAMMA_API_BASE.into(),
        }
    }

    /// Look up one market descriptor by slug. The endpoint returns an
    /// array; an empty array means the slug is unknown.
    pub async fn get_market_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<GammaMarket>, GammaClientError> {
        let url = format!("{}/markets", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await?
            .error_for_status()?;

        let markets: Vec<GammaMarket> = resp.json().await?;
        Ok(markets.into_iter().next())
    }

    /// Look up market descriptors by condition id. Gamma silently ignores
    /// unknown filter params and returns default paginated results, so the
    /// returned conditionId must be verified against the request.
    pub async fn get_markets_by_condition_ids(
        &self,
        condition_ids: &[String],
    ) -> Result<Vec<GammaMarket>, GammaClientError> {
        let url = format!("{}/markets", self.base_url);
        let query: Vec<(&str, &str)> = condition_ids
            .iter()
            .map(|id| ("condition_ids", id.as_str()))
            .collect();
        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let markets: Vec<GammaMarket> = resp.json().await?;
        Ok(markets
            .into_iter()
            .filter(|m| {
                m.condition_id
                    .as_deref()
                    .is_some_and(|cid| condition_ids.iter().any(|want| want == cid))
            })
            .collect())
    }

    /// Look up one event (and its nested markets) by event slug.
    pub async fn get_event_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<GammaEvent>, GammaClientError> {
        let url = format!("{}/events", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await?
            .error_for_status()?;

        let events: Vec<GammaEvent> = resp.json().await?;
        Ok(events.into_iter().next())
    }
}
