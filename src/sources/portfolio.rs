use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::watcher::txkind::{self, DecodedLogEvent, DecodedTransaction};

use super::SourceError;

/// One token position in a wallet, with its share of the portfolio's
/// total USD value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub token_address: String,
    pub symbol: String,
    /// Human units, already scaled down by the token's decimals.
    pub balance: f64,
    pub price_usd: Option<f64>,
    pub value_usd: f64,
    pub percent_of_portfolio: f64,
}

/// A wallet's decoded transaction, as returned by history lookups.
#[derive(Debug, Clone, Serialize)]
pub struct TxSummary {
    pub hash: String,
    pub block_time: Option<String>,
    pub success: Option<bool>,
    pub transaction: DecodedTransaction,
}

/// Wallet balances and transaction history.
#[async_trait]
pub trait PortfolioSource: Send + Sync {
    async fn holdings(&self, wallet: &str) -> Result<Vec<Holding>, SourceError>;
    async fn transaction_history(&self, wallet: &str) -> Result<Vec<TxSummary>, SourceError>;
}

// ============================================================
// Sim API implementation
// ============================================================

// GET {base}/v1/evm/balances/{wallet}?chain_ids={id} and
// GET {base}/v1/evm/transactions/{wallet}?chain_ids={id}&decode=true,
// both authenticated with the X-Sim-Api-Key header. Balance amounts come
// back in raw base units; history logs come back ABI-decoded.

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    address: Option<String>,
    symbol: Option<String>,
    amount: Option<RawAmount>,
    decimals: Option<u8>,
    price_usd: Option<f64>,
    value_usd: Option<f64>,
}

/// Raw base-unit amount. The venue renders these as decimal strings, but
/// small values occasionally arrive as JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(f64),
}

impl RawAmount {
    fn as_f64(&self) -> f64 {
        match self {
            RawAmount::Text(s) => s.parse::<f64>().unwrap_or(0.0),
            RawAmount::Number(n) => *n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<TransactionEntry>,
}

#[derive(Debug, Deserialize)]
struct TransactionEntry {
    hash: Option<String>,
    chain: Option<String>,
    block_time: Option<String>,
    success: Option<bool>,
    #[serde(default)]
    logs: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    decoded: Option<DecodedLogEvent>,
}

pub struct SimApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
    chain_name: String,
}

impl SimApiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        chain_id: u64,
        chain_name: &str,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chain_id,
            chain_name: chain_name.to_string(),
        })
    }
}

#[async_trait]
impl PortfolioSource for SimApiClient {
    async fn holdings(&self, wallet: &str) -> Result<Vec<Holding>, SourceError> {
        let url = format!("{}/v1/evm/balances/{}", self.base_url, wallet);
        let response = self
            .http
            .get(&url)
            .header("X-Sim-Api-Key", &self.api_key)
            .query(&[("chain_ids", self.chain_id.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::BadResponse(format!(
                "balances request for {wallet} returned {status}"
            )));
        }

        let body: BalancesResponse = response.json().await?;
        Ok(build_holdings(body.balances))
    }

    async fn transaction_history(&self, wallet: &str) -> Result<Vec<TxSummary>, SourceError> {
        let url = format!("{}/v1/evm/transactions/{}", self.base_url, wallet);
        let response = self
            .http
            .get(&url)
            .header("X-Sim-Api-Key", &self.api_key)
            .query(&[
                ("chain_ids", self.chain_id.to_string()),
                ("decode", "true".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::BadResponse(format!(
                "transactions request for {wallet} returned {status}"
            )));
        }

        let body: TransactionsResponse = response.json().await?;
        let mut summaries = Vec::with_capacity(body.transactions.len());
        for tx in body.transactions {
            // chain_ids already filters server-side; skip strays anyway.
            if let Some(chain) = &tx.chain {
                if chain != &self.chain_name {
                    continue;
                }
            }
            let Some(hash) = tx.hash else {
                continue;
            };
            let events: Vec<DecodedLogEvent> =
                tx.logs.into_iter().filter_map(|log| log.decoded).collect();
            summaries.push(TxSummary {
                transaction: txkind::classify_transaction(&hash, &events),
                hash,
                block_time: tx.block_time,
                success: tx.success,
            });
        }
        Ok(summaries)
    }
}

fn build_holdings(balances: Vec<BalanceEntry>) -> Vec<Holding> {
    let total_value: f64 = balances
        .iter()
        .filter_map(|entry| entry.value_usd)
        .sum();

    balances
        .into_iter()
        .map(|entry| {
            let decimals = entry.decimals.unwrap_or(18);
            let raw = entry.amount.map(|a| a.as_f64()).unwrap_or(0.0);
            let value_usd = entry.value_usd.unwrap_or(0.0);
            let percent = if total_value > 0.0 {
                value_usd * 100.0 / total_value
            } else {
                0.0
            };
            Holding {
                token_address: entry.address.unwrap_or_default(),
                symbol: entry.symbol.unwrap_or_default(),
                balance: raw / 10f64.powi(decimals as i32),
                price_usd: entry.price_usd,
                value_usd,
                percent_of_portfolio: percent,
            }
        })
        .collect()
}
