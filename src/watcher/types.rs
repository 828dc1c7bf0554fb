use alloy::primitives::Address;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::ChainConfig;

/// Symbol and decimals for a watched token.
#[derive(Debug, Clone)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
}

/// Transfer published on the `onchain` channel once decoded and priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub token: String,
    pub symbol: String,
    /// Human-unit token amount (raw amount divided by decimals).
    pub amount: f64,
    pub amount_usd: f64,
    pub from_address: String,
    pub to_address: String,
    pub transaction_hash: String,
    pub block_number: u64,
}

/// Build an in-memory lookup of watched token addresses.
/// Used by the decoder to cheaply drop logs from untracked contracts.
pub fn build_watched_tokens(config: &ChainConfig) -> HashMap<Address, TokenMeta> {
    let mut map = HashMap::new();
    for token in &config.tokens {
        match Address::from_str(&token.address) {
            Ok(address) => {
                map.insert(
                    address,
                    TokenMeta {
                        symbol: token.symbol.clone(),
                        decimals: token.decimals,
                    },
                );
            }
            Err(e) => {
                tracing::error!(
                    symbol = %token.symbol,
                    address = %token.address,
                    error = %e,
                    "Invalid token address in config, skipping"
                );
            }
        }
    }
    map
}

/// Convert a raw on-chain amount into human units.
pub fn raw_to_human(amount: &BigDecimal, decimals: u8) -> f64 {
    let divisor = BigDecimal::from(10u64.pow(decimals as u32));
    (amount / divisor).to_f64().unwrap_or(0.0)
}
