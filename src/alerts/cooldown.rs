//! Per-(wallet, alert-type) trigger suppression.
//!
//! Trigger history is a JSON array of timestamps at
//! `cooldown:{wallet}:{alert_type}`, pruned to a rolling 24 h window. The
//! tracker serializes its read-modify-write through its own lock, so two
//! concurrent coordination runs cannot both slip past the same window.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::store::{SharedStore, StoreError};

const HISTORY_HOURS: i64 = 24;

#[derive(Clone)]
pub struct CooldownTracker {
    store: SharedStore,
    lock: std::sync::Arc<Mutex<()>>,
}

impl CooldownTracker {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            lock: std::sync::Arc::new(Mutex::new(())),
        }
    }

    /// True iff no trigger is recorded for `key` within the window.
    pub async fn should_trigger(&self, key: &str, window_minutes: u64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(!self.triggered_within(key, window_minutes).await?)
    }

    /// Append a trigger timestamp and prune history older than 24 h.
    pub async fn record_trigger(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.append_now(key).await
    }

    /// Check-and-record under one lock acquisition. Returns false without
    /// recording when the key is still cooling down.
    pub async fn try_trigger(&self, key: &str, window_minutes: u64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        if self.triggered_within(key, window_minutes).await? {
            return Ok(false);
        }
        self.append_now(key).await?;
        Ok(true)
    }

    async fn triggered_within(&self, key: &str, window_minutes: u64) -> Result<bool, StoreError> {
        let history = self.load(key).await?;
        let window_start = Utc::now() - Duration::minutes(window_minutes as i64);
        Ok(history.iter().any(|t| *t >= window_start))
    }

    async fn append_now(&self, key: &str) -> Result<(), StoreError> {
        let cutoff = Utc::now() - Duration::hours(HISTORY_HOURS);
        let mut history: Vec<DateTime<Utc>> = self
            .load(key)
            .await?
            .into_iter()
            .filter(|t| *t > cutoff)
            .collect();
        history.push(Utc::now());
        self.store
            .set(&storage_key(key), &serde_json::to_string(&history)?)
            .await
    }

    async fn load(&self, key: &str) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.store.get(&storage_key(key)).await? else {
            return Ok(Vec::new());
        };
        // a corrupt entry resets the history rather than wedging the alert path
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }
}

fn storage_key(key: &str) -> String {
    format!("cooldown:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn tracker_with_store() -> (CooldownTracker, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CooldownTracker::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_fresh_key_triggers() {
        let (tracker, _) = tracker_with_store();
        assert!(tracker.should_trigger("0xw:critical_risk", 60).await.unwrap());
        assert!(tracker.try_trigger("0xw:critical_risk", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_trigger_within_window_is_suppressed() {
        let (tracker, _) = tracker_with_store();
        assert!(tracker.try_trigger("0xw:high_risk", 120).await.unwrap());
        assert!(!tracker.try_trigger("0xw:high_risk", 120).await.unwrap());
        assert!(!tracker.should_trigger("0xw:high_risk", 120).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (tracker, _) = tracker_with_store();
        assert!(tracker.try_trigger("0xa:liquidity", 240).await.unwrap());
        assert!(tracker.try_trigger("0xb:liquidity", 240).await.unwrap());
        assert!(tracker.try_trigger("0xa:concentration", 180).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_trigger_allows_retrigger_and_prunes() {
        let (tracker, store) = tracker_with_store();
        let old = vec![
            Utc::now() - Duration::hours(30),
            Utc::now() - Duration::minutes(90),
        ];
        store
            .set(
                &storage_key("0xw:market_stress"),
                &serde_json::to_string(&old).unwrap(),
            )
            .await
            .unwrap();

        // last trigger was 90 minutes ago; a 60 minute window has reopened
        assert!(tracker.try_trigger("0xw:market_stress", 60).await.unwrap());

        let raw = store
            .get(&storage_key("0xw:market_stress"))
            .await
            .unwrap()
            .unwrap();
        let history: Vec<DateTime<Utc>> = serde_json::from_str(&raw).unwrap();
        // the 30h-old entry is pruned; the 90m-old entry and the new one stay
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_window_still_closed_counts_older_entries() {
        let (tracker, store) = tracker_with_store();
        let history = vec![Utc::now() - Duration::minutes(30)];
        store
            .set(
                &storage_key("0xw:contract_risk"),
                &serde_json::to_string(&history).unwrap(),
            )
            .await
            .unwrap();
        assert!(!tracker.try_trigger("0xw:contract_risk", 360).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_history_resets() {
        let (tracker, store) = tracker_with_store();
        store
            .set(&storage_key("0xw:high_risk"), "not json")
            .await
            .unwrap();
        assert!(tracker.try_trigger("0xw:high_risk", 120).await.unwrap());
    }
}
