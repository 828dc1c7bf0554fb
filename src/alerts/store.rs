//! Persisted consolidated alerts, one record per wallet.
//!
//! Records live in the `USERS_ALERT` hash keyed by wallet address and are
//! replaced wholesale on every coordination run; alert history lives in the
//! cooldown log, not here.

use serde::Serialize;

use crate::store::{SharedStore, StoreError, USERS_ALERT_KEY};

use super::types::{Alert, ConsolidatedAlert};

/// The `{wallet_address, alerts}` view handed to API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct WalletAlerts {
    pub wallet_address: String,
    pub alerts: Vec<Alert>,
}

#[derive(Clone)]
pub struct AlertStore {
    store: SharedStore,
}

impl AlertStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Replace the wallet's record (latest-wins).
    pub async fn store(&self, alert: &ConsolidatedAlert) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(alert)?;
        self.store
            .hset(USERS_ALERT_KEY, &alert.wallet_address, &serialized)
            .await?;
        tracing::info!(
            wallet = %alert.wallet_address,
            alerts = alert.total_alerts_triggered,
            severity = ?alert.overall_severity,
            "Stored consolidated alert"
        );
        Ok(())
    }

    pub async fn get(&self, wallet: &str) -> Result<Option<ConsolidatedAlert>, StoreError> {
        let Some(raw) = self.store.hget(USERS_ALERT_KEY, wallet).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// The wallet's raw alerts, newest first, truncated to `limit`. A wallet
    /// with no record yields an empty view rather than an error.
    pub async fn alerts_for(&self, wallet: &str, limit: usize) -> Result<WalletAlerts, StoreError> {
        let mut alerts = match self.get(wallet).await? {
            Some(record) => record.raw_alerts,
            None => Vec::new(),
        };
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        Ok(WalletAlerts {
            wallet_address: wallet.to_string(),
            alerts,
        })
    }

    pub async fn undelivered(&self, wallet: &str) -> Result<Vec<Alert>, StoreError> {
        let view = self.alerts_for(wallet, usize::MAX).await?;
        Ok(view.alerts.into_iter().filter(|a| !a.delivered).collect())
    }

    /// Flip the matching raw alert to delivered and persist. Returns false
    /// without writing when the id is not in the wallet's record.
    pub async fn mark_delivered(
        &self,
        wallet: &str,
        alert_id: &str,
        delivery_method: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut record) = self.get(wallet).await? else {
            return Ok(false);
        };
        let Some(alert) = record
            .raw_alerts
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
        else {
            return Ok(false);
        };

        alert.delivered = true;
        alert.delivery_method = Some(delivery_method.to_string());
        self.store(&record).await?;
        tracing::info!(
            wallet = %wallet,
            alert_id = %alert_id,
            method = %delivery_method,
            "Alert marked delivered"
        );
        Ok(true)
    }
}
