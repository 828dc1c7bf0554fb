//! Shared key-value state for the alert pipeline.
//!
//! Keys (namespaced by the configured prefix on the Redis backend):
//! - `tracked_wallets`: set of wallet addresses under periodic monitoring
//! - `USERS_ALERT`: hash of wallet -> serialized consolidated alert record
//! - `cooldown:{wallet}:{alert_type}`: JSON array of trigger timestamps
//! - `whale_movements`: rolling 24h list of observed whale transfers
//! - `DAILY_DIGEST`: capped list of delivered digest entries
//!
//! Everything goes through the [`KvStore`] trait so the pipeline can run
//! against [`MemoryStore`] in tests and against Redis in deployment.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::sync::Arc;

/// Set holding every wallet under periodic monitoring.
pub const TRACKED_WALLETS_KEY: &str = "tracked_wallets";
/// Hash of wallet address -> serialized consolidated alert record.
pub const USERS_ALERT_KEY: &str = "USERS_ALERT";
/// Rolling list of observed whale movements (pruned to 24h).
pub const WHALE_MOVEMENTS_KEY: &str = "whale_movements";
/// Capped list of digest entries written by the automation agent.
pub const DAILY_DIGEST_KEY: &str = "DAILY_DIGEST";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SharedStore = Arc<dyn KvStore>;

/// Minimal key-value surface the pipeline needs: strings with optional TTL,
/// one hash, sets and lists with redis-style index semantics.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Returns true when the member was not already present.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    /// Returns true when the member existed.
    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Returns the list length after the push.
    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError>;
    /// Inclusive range with redis negative-index semantics.
    async fn lrange(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError>;
}
