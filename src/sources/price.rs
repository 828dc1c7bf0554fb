use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::SourceError;

/// Spot price plus the one-hour percent change when the venue reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub change_1h_percent: Option<f64>,
}

/// Market price lookup by token contract address.
/// `Ok(None)` means "no market data", which downstream treats as a valid
/// unconfirmed state rather than an error.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn token_price(&self, token_address: &str) -> Result<Option<PriceQuote>, SourceError>;
}

// ============================================================
// DexScreener implementation
// ============================================================

// GET {base}/latest/dex/tokens/{address} -> { pairs: [ { priceUsd,
// priceChange: { h1 } } ] }; the first pair is the reference market.

#[derive(Debug, Deserialize)]
struct TokensResponse {
    pairs: Option<Vec<PairEntry>>,
}

#[derive(Debug, Deserialize)]
struct PairEntry {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    #[serde(rename = "priceChange")]
    price_change: Option<PriceChange>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    h1: Option<f64>,
}

pub struct DexScreenerFeed {
    http: reqwest::Client,
    base_url: String,
}

impl DexScreenerFeed {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceFeed for DexScreenerFeed {
    async fn token_price(&self, token_address: &str) -> Result<Option<PriceQuote>, SourceError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token_address);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            tracing::debug!(
                token = %token_address,
                status = %response.status(),
                "Price lookup returned non-success status"
            );
            return Ok(None);
        }

        let body: TokensResponse = response.json().await?;
        let Some(pair) = body.pairs.and_then(|pairs| pairs.into_iter().next()) else {
            return Ok(None);
        };
        let Some(price) = pair.price_usd.and_then(|p| p.parse::<f64>().ok()) else {
            return Ok(None);
        };

        Ok(Some(PriceQuote {
            price,
            change_1h_percent: pair.price_change.and_then(|c| c.h1),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_response_parses() {
        let body = r#"{"pairs": [{"priceUsd": "1.2345", "priceChange": {"h1": -2.5}}]}"#;
        let parsed: TokensResponse = serde_json::from_str(body).unwrap();
        let pair = parsed.pairs.unwrap().into_iter().next().unwrap();
        assert_eq!(pair.price_usd.as_deref(), Some("1.2345"));
        assert_eq!(pair.price_change.unwrap().h1, Some(-2.5));
    }

    #[test]
    fn test_empty_pairs_parses() {
        let parsed: TokensResponse = serde_json::from_str(r#"{"pairs": null}"#).unwrap();
        assert!(parsed.pairs.is_none());
        let parsed: TokensResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.pairs.is_none());
    }
}
