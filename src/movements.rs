//! Rolling 24 h log of classified whale movements, backing the
//! manipulation check's pattern history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{SharedStore, StoreError, WHALE_MOVEMENTS_KEY};

const WINDOW_HOURS: i64 = 24;

/// Market impact on a 0-10 scale, tiered by USD size.
pub fn impact_score(amount_usd: f64) -> f64 {
    if amount_usd > 10_000_000.0 {
        10.0
    } else if amount_usd > 5_000_000.0 {
        8.5
    } else if amount_usd > 1_000_000.0 {
        7.0
    } else if amount_usd > 500_000.0 {
        5.0
    } else {
        3.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleMovementRecord {
    pub token: String,
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: f64,
    pub from_address: String,
    pub to_address: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub impact_score: f64,
    pub observed_at: DateTime<Utc>,
}

/// List-backed movement history. Entries are appended in observation order,
/// so pruning only ever drops a prefix.
#[derive(Clone)]
pub struct MovementLog {
    store: SharedStore,
}

impl MovementLog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Append a movement and drop everything that has aged out of the
    /// 24 h window.
    pub async fn record(&self, record: &WhaleMovementRecord) -> Result<(), StoreError> {
        let entries = self.store.lrange(WHALE_MOVEMENTS_KEY, 0, -1).await?;
        let cutoff = Utc::now() - Duration::hours(WINDOW_HOURS);

        // unparseable entries count as expired and get trimmed with the rest
        let keep_from = entries.iter().position(|raw| {
            serde_json::from_str::<WhaleMovementRecord>(raw)
                .map(|r| r.observed_at >= cutoff)
                .unwrap_or(false)
        });
        match keep_from {
            Some(0) => {}
            Some(idx) => {
                self.store
                    .ltrim(WHALE_MOVEMENTS_KEY, idx as isize, -1)
                    .await?
            }
            None if entries.is_empty() => {}
            // start > stop empties the list, same idiom redis uses
            None => self.store.ltrim(WHALE_MOVEMENTS_KEY, 1, 0).await?,
        }

        let serialized = serde_json::to_string(record)?;
        self.store.rpush(WHALE_MOVEMENTS_KEY, &serialized).await?;
        Ok(())
    }

    /// All movements observed within the 24 h window, oldest first.
    pub async fn recent(&self) -> Result<Vec<WhaleMovementRecord>, StoreError> {
        let cutoff = Utc::now() - Duration::hours(WINDOW_HOURS);
        let entries = self.store.lrange(WHALE_MOVEMENTS_KEY, 0, -1).await?;
        Ok(entries
            .iter()
            .filter_map(|raw| serde_json::from_str::<WhaleMovementRecord>(raw).ok())
            .filter(|r| r.observed_at >= cutoff)
            .collect())
    }
}
