//! The scatter checks fanned out per whale event.
//!
//! Each check probes one angle (market, social, manipulation, portfolio)
//! and reports a JSON payload. Checks never see each other; the
//! orchestrator owns fan-out, timeouts, and error capture.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::classifier::ClassifiedEvent;
use crate::movements::MovementLog;
use crate::sources::{PortfolioSource, PriceFeed, SocialFeed, SourceError};
use crate::store::{SharedStore, StoreError, TRACKED_WALLETS_KEY};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("check timed out after {0}s")]
    Timeout(u64),
}

/// One orchestration check over a classified whale event.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, event: &ClassifiedEvent) -> Result<Value, CheckError>;
}

// ============================================================
// Market check
// ============================================================

/// Confirms the movement against live market data. A token with no listed
/// pair is a valid unconfirmed result, not an error.
pub struct MarketCheck {
    prices: Arc<dyn PriceFeed>,
}

impl MarketCheck {
    pub fn new(prices: Arc<dyn PriceFeed>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl Check for MarketCheck {
    fn name(&self) -> &'static str {
        "market"
    }

    async fn run(&self, event: &ClassifiedEvent) -> Result<Value, CheckError> {
        let quote = self.prices.token_price(&event.token).await?;
        Ok(match quote {
            Some(quote) => json!({
                "price_change_1h_percent": quote.change_1h_percent,
                "price": quote.price,
                "market_confirmed": true,
            }),
            None => json!({
                "price_change_1h_percent": null,
                "price": null,
                "market_confirmed": false,
            }),
        })
    }
}

// ============================================================
// Social check
// ============================================================

/// Post volume above this baseline reads as a mention spike.
const SPIKE_BASELINE_POSTS: u64 = 50;

pub struct SocialCheck {
    feed: Arc<dyn SocialFeed>,
}

impl SocialCheck {
    pub fn new(feed: Arc<dyn SocialFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl Check for SocialCheck {
    fn name(&self) -> &'static str {
        "social"
    }

    async fn run(&self, event: &ClassifiedEvent) -> Result<Value, CheckError> {
        let snapshot = self.feed.token_sentiment(&event.symbol).await?;
        let spike = if snapshot.total_posts > SPIKE_BASELINE_POSTS {
            300
        } else {
            50
        };
        Ok(json!({
            "summary": snapshot.summary,
            "total_posts": snapshot.total_posts,
            "mentions_spike_percent": spike,
        }))
    }
}

// ============================================================
// Manipulation check
// ============================================================

/// Counts prior same-symbol movements in the 24 h history. Repeated large
/// transfers of one token inside the window raise the pattern risk.
pub struct ManipulationCheck {
    movements: MovementLog,
}

impl ManipulationCheck {
    pub fn new(movements: MovementLog) -> Self {
        Self { movements }
    }
}

#[async_trait]
impl Check for ManipulationCheck {
    fn name(&self) -> &'static str {
        "manipulation"
    }

    async fn run(&self, event: &ClassifiedEvent) -> Result<Value, CheckError> {
        let recent = self.movements.recent().await?;
        // The event's own record is already in the history; exclude it by hash.
        let similar = recent
            .iter()
            .filter(|m| m.transaction_hash != event.transaction_hash)
            .filter(|m| m.symbol.eq_ignore_ascii_case(&event.symbol))
            .count();
        let risk = if similar < 2 { "low" } else { "medium" };
        Ok(json!({
            "recent_similar_movements": similar,
            "risk": risk,
        }))
    }
}

// ============================================================
// Portfolio check
// ============================================================

/// Flags tracked wallets holding the moved token so delivery can target
/// the users the movement actually concerns.
pub struct PortfolioCheck {
    store: SharedStore,
    portfolios: Arc<dyn PortfolioSource>,
}

impl PortfolioCheck {
    pub fn new(store: SharedStore, portfolios: Arc<dyn PortfolioSource>) -> Self {
        Self { store, portfolios }
    }
}

#[async_trait]
impl Check for PortfolioCheck {
    fn name(&self) -> &'static str {
        "portfolio"
    }

    async fn run(&self, event: &ClassifiedEvent) -> Result<Value, CheckError> {
        let wallets = self.store.smembers(TRACKED_WALLETS_KEY).await?;
        if wallets.is_empty() {
            return Ok(json!({
                "tracked_wallets": 0,
                "wallet_to_notify": [],
            }));
        }

        let fetches = wallets.iter().map(|w| self.portfolios.holdings(w));
        let portfolios = futures::future::try_join_all(fetches).await?;

        let mut wallet_to_notify = Vec::new();
        for (wallet, holdings) in wallets.iter().zip(portfolios) {
            let holds_symbol = holdings
                .iter()
                .any(|h| h.symbol.eq_ignore_ascii_case(&event.symbol));
            if holds_symbol {
                wallet_to_notify.push(wallet.clone());
            }
        }

        tracing::debug!(
            symbol = %event.symbol,
            tracked = wallets.len(),
            relevant = wallet_to_notify.len(),
            "Portfolio relevance computed"
        );
        Ok(json!({
            "tracked_wallets": wallets.len(),
            "wallet_to_notify": wallet_to_notify,
        }))
    }
}
