//! Automation-channel consumer feeding the rolling daily digest.
//!
//! Every alert dispatched on `automation` gets stamped with its digest
//! time and appended to the `DAILY_DIGEST` list, which is trimmed to a
//! configured cap so it cannot grow without bound.

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::bus::{self, EventBus};
use crate::store::{SharedStore, StoreError, DAILY_DIGEST_KEY};

#[derive(Clone)]
pub struct DigestLog {
    store: SharedStore,
    cap: usize,
}

impl DigestLog {
    pub fn new(store: SharedStore, cap: usize) -> Self {
        Self {
            store,
            cap: cap.max(1),
        }
    }

    /// Stamp and append one delivered alert, keeping only the newest
    /// `cap` entries.
    pub async fn append(&self, mut payload: Value) -> Result<(), StoreError> {
        if let Value::Object(ref mut entry) = payload {
            entry.insert(
                "digest_time".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let length = self
            .store
            .rpush(DAILY_DIGEST_KEY, &payload.to_string())
            .await?;
        if length as usize > self.cap {
            self.store
                .ltrim(DAILY_DIGEST_KEY, -(self.cap as isize), -1)
                .await?;
        }
        tracing::debug!(entries = length.min(self.cap as u64), "Digest entry added");
        Ok(())
    }

    /// Newest entries first, up to `limit`. Unparseable entries are
    /// dropped rather than failing the read.
    pub async fn entries(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        let raw = self.store.lrange(DAILY_DIGEST_KEY, 0, -1).await?;
        Ok(raw
            .iter()
            .rev()
            .filter_map(|entry| serde_json::from_str(entry).ok())
            .take(limit)
            .collect())
    }
}

/// Consume the `automation` channel into the digest list.
pub async fn run_digest_agent(
    digest: DigestLog,
    bus: EventBus,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let mut rx = bus.subscribe(bus::AUTOMATION)?;
    tracing::info!("Digest agent listening for automation alerts");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Digest agent shutting down");
                break;
            }
            received = rx.recv() => match received {
                Ok(payload) => {
                    if let Err(e) = digest.append(payload).await {
                        tracing::error!(error = %e, "Digest append failed");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Digest agent lagged behind automation channel");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_append_stamps_digest_time() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let digest = DigestLog::new(Arc::clone(&store), 10);

        digest
            .append(json!({"title": "On-chain alert: large MNT movement", "summary": "s"}))
            .await
            .unwrap();

        let entries = digest.entries(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["title"], "On-chain alert: large MNT movement");
        assert!(entries[0]["digest_time"].is_string());
    }

    #[tokio::test]
    async fn test_list_is_trimmed_to_cap() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let digest = DigestLog::new(Arc::clone(&store), 3);

        for i in 0..5 {
            digest.append(json!({"seq": i})).await.unwrap();
        }

        let entries = digest.entries(10).await.unwrap();
        assert_eq!(entries.len(), 3);
        // newest first, oldest two trimmed away
        assert_eq!(entries[0]["seq"], 4);
        assert_eq!(entries[2]["seq"], 2);

        let raw = store.lrange(DAILY_DIGEST_KEY, 0, -1).await.unwrap();
        assert_eq!(raw.len(), 3);
    }

    #[tokio::test]
    async fn test_agent_consumes_automation_channel() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let digest = DigestLog::new(Arc::clone(&store), 10);
        let bus = EventBus::new(16);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_digest_agent(
            digest.clone(),
            bus.clone(),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        bus.publish(bus::AUTOMATION, &json!({"title": "alert"})).unwrap();

        // wait for the consumer to drain the message
        let mut entries = Vec::new();
        for _ in 0..20 {
            entries = digest.entries(10).await.unwrap();
            if !entries.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["title"], "alert");

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
