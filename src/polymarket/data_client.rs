use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::types::FeedTrade;

const DATA_API_BASE: &str = "https://data-api.polymarket.com";

#[derive(Debug, Error)]
pub enum DataClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(StatusCode),
}

impl DataClientError {
    /// A 4xx at a deep pagination offset means the feed has no more data,
    /// which the fetcher treats as a normal stop rather than a failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DataClientError::Status(s) if s.is_client_error())
    }
}

#[derive(Debug, Clone)]
pub struct DataClient {
    http: Client,
    base_url: String,
}

impl DataClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: DATA_API_BASE.into(),
        }
    }

    /// Fetch one page of the trade feed, filtered server-side to taker
    /// fills with cash value at or above `min_amount`.
    pub async fn get_trades(
        &self,
        limit: u32,
        offset: u32,
        min_amount: u32,
    ) -> Result<Vec<FeedTrade>, DataClientError> {
        let url = format!("{}/trades", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("filterType", "CASH".to_string()),
                ("filterAmount", min_amount.to_string()),
                ("takerOnly", "true".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataClientError::Status(status));
        }

        let trades: Vec<FeedTrade> = resp.json().await?;
        Ok(trades)
    }
}
