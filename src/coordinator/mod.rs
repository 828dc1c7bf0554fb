//! Cross-agent alert coordination for tracked wallets.
//!
//! One coordination run fans the analysis task group (risk, social, macro)
//! out concurrently for a wallet, folds the reports into a single
//! consolidated alert, persists it latest-wins, and reports counts per
//! agent. The periodic monitor repeats this over every tracked wallet.

pub mod consolidate;
pub mod tasks;

pub use consolidate::consolidate;
pub use tasks::{AnalysisTask, MacroTask, RiskTask, SocialTask, TaskReport, TaskStatus};

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::alerts::{Alert, AlertStore};
use crate::store::{SharedStore, StoreError, TRACKED_WALLETS_KEY};

// ============================================================
// Coordination results
// ============================================================

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AlertsByType {
    pub risk: usize,
    pub sentiment: usize,
    #[serde(rename = "macro")]
    pub macro_: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinationResult {
    pub status: String,
    pub wallet_address: String,
    pub total_alerts: usize,
    pub alerts_by_type: AlertsByType,
    pub all_alerts: Vec<Alert>,
    pub analyses_completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub status: String,
    pub wallets_processed: usize,
    pub total_alerts_triggered: usize,
    pub summary: Vec<CoordinationResult>,
}

// ============================================================
// Coordinator
// ============================================================

pub struct AlertCoordinator {
    tasks: Vec<Arc<dyn AnalysisTask>>,
    alert_store: AlertStore,
}

impl AlertCoordinator {
    pub fn new(tasks: Vec<Arc<dyn AnalysisTask>>, alert_store: AlertStore) -> Self {
        Self { tasks, alert_store }
    }

    /// Run the analysis group for one wallet, consolidate, and persist.
    /// `analysis_types` selects a subset of agents; `None` runs all.
    pub async fn coordinate(
        &self,
        wallet: &str,
        analysis_types: Option<&[String]>,
    ) -> Result<CoordinationResult, StoreError> {
        let selected: Vec<&Arc<dyn AnalysisTask>> = self
            .tasks
            .iter()
            .filter(|task| {
                analysis_types
                    .map(|types| types.iter().any(|t| t == task.agent()))
                    .unwrap_or(true)
            })
            .collect();

        tracing::info!(
            wallet = %wallet,
            analyses = selected.len(),
            "Coordinating alerts"
        );

        let handles: Vec<(&'static str, JoinHandle<TaskReport>)> = selected
            .iter()
            .map(|task| {
                let task = Arc::clone(task);
                let wallet = wallet.to_string();
                let agent = task.agent();
                (agent, tokio::spawn(async move { task.run(&wallet).await }))
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (agent, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(agent, error = %e, "Analysis task aborted");
                    TaskReport::failed(agent, format!("task aborted: {e}"))
                }
            };
            reports.push(report);
        }

        let consolidated = consolidate(wallet, &reports);
        self.alert_store.store(&consolidated).await?;

        let mut by_type = AlertsByType::default();
        for report in &reports {
            match report.agent.as_str() {
                "risk" => by_type.risk += report.alerts.len(),
                "social" => by_type.sentiment += report.alerts.len(),
                "macro" => by_type.macro_ += report.alerts.len(),
                other => {
                    tracing::debug!(agent = other, "Uncategorized agent in coordination run");
                }
            }
        }

        let all_alerts = consolidated.raw_alerts;
        tracing::info!(
            wallet = %wallet,
            total_alerts = all_alerts.len(),
            "Alert coordination completed"
        );

        Ok(CoordinationResult {
            status: "completed".to_string(),
            wallet_address: wallet.to_string(),
            total_alerts: all_alerts.len(),
            alerts_by_type: by_type,
            all_alerts,
            analyses_completed: reports.len(),
        })
    }

    /// Coordinate several wallets concurrently and sum the triggers. A
    /// wallet whose run fails is logged and skipped, not fatal to the batch.
    pub async fn coordinate_batch(&self, wallets: &[String]) -> BatchResult {
        tracing::info!(wallets = wallets.len(), "Batch alert processing");

        let runs = wallets.iter().map(|wallet| self.coordinate(wallet, None));
        let results = futures::future::join_all(runs).await;

        let mut summary = Vec::new();
        let mut total_alerts_triggered = 0;
        for (wallet, result) in wallets.iter().zip(results) {
            match result {
                Ok(result) => {
                    total_alerts_triggered += result.total_alerts;
                    summary.push(result);
                }
                Err(e) => {
                    tracing::error!(wallet = %wallet, error = %e, "Wallet coordination failed");
                }
            }
        }

        BatchResult {
            status: "completed".to_string(),
            wallets_processed: wallets.len(),
            total_alerts_triggered,
            summary,
        }
    }
}

// ============================================================
// Task registry
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Processing,
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusRecord {
    pub task_id: Uuid,
    pub state: TaskState,
    pub progress: Value,
}

/// In-process registry of background coordination runs, so API callers can
/// poll a task id through `PENDING -> PROCESSING -> SUCCESS | FAILURE`.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    records: Arc<RwLock<HashMap<Uuid, TaskStatusRecord>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let task_id = Uuid::new_v4();
        self.records.write().await.insert(
            task_id,
            TaskStatusRecord {
                task_id,
                state: TaskState::Pending,
                progress: Value::Null,
            },
        );
        task_id
    }

    pub async fn update(&self, task_id: Uuid, state: TaskState, progress: Value) {
        let mut records = self.records.write().await;
        match records.get_mut(&task_id) {
            Some(record) => {
                record.state = state;
                record.progress = progress;
            }
            None => {
                tracing::warn!(%task_id, "Status update for unknown task");
            }
        }
    }

    pub async fn get(&self, task_id: Uuid) -> Option<TaskStatusRecord> {
        self.records.read().await.get(&task_id).cloned()
    }
}

// ============================================================
// Periodic monitor
// ============================================================

/// Re-coordinate every tracked wallet on a fixed interval.
pub async fn run_periodic_monitor(
    coordinator: Arc<AlertCoordinator>,
    store: SharedStore,
    interval_minutes: u64,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let period = Duration::from_secs(interval_minutes * 60);
    tracing::info!(interval_minutes, "Periodic portfolio monitoring started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Periodic monitor shutting down");
                break;
            }
            _ = tokio::time::sleep(period) => {
                let wallets = match store.smembers(TRACKED_WALLETS_KEY).await {
                    Ok(wallets) => wallets,
                    Err(e) => {
                        tracing::error!(error = %e, "Could not load tracked wallets");
                        continue;
                    }
                };
                if wallets.is_empty() {
                    tracing::debug!("No wallets in tracking list");
                    continue;
                }

                let batch = coordinator.coordinate_batch(&wallets).await;
                tracing::info!(
                    wallets = batch.wallets_processed,
                    alerts = batch.total_alerts_triggered,
                    "Periodic monitoring pass completed"
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertManager, CooldownTracker};
    use crate::config::CooldownConfig;
    use crate::sources::{
        HeuristicRiskScorer, Holding, PortfolioSource, SourceError, TxSummary,
    };
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    struct ConcentratedPortfolio;

    #[async_trait]
    impl PortfolioSource for ConcentratedPortfolio {
        async fn holdings(&self, _wallet: &str) -> Result<Vec<Holding>, SourceError> {
            Ok(vec![Holding {
                token_address: "0xtoken".to_string(),
                symbol: "SHDW".to_string(),
                balance: 50_000.0,
                price_usd: Some(1.0),
                value_usd: 50_000.0,
                percent_of_portfolio: 100.0,
            }])
        }

        async fn transaction_history(&self, _wallet: &str) -> Result<Vec<TxSummary>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn risk_only_coordinator(store: &SharedStore) -> AlertCoordinator {
        let manager = AlertManager::new(
            CooldownTracker::new(Arc::clone(store)),
            CooldownConfig::default(),
        );
        let task = RiskTask::new(
            Arc::new(ConcentratedPortfolio),
            Arc::new(HeuristicRiskScorer),
            manager,
        );
        AlertCoordinator::new(vec![Arc::new(task)], AlertStore::new(Arc::clone(store)))
    }

    #[tokio::test]
    async fn test_repeat_coordination_is_suppressed_by_cooldowns() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let coordinator = risk_only_coordinator(&store);

        let first = coordinator.coordinate("0xwallet", None).await.unwrap();
        assert_eq!(first.status, "completed");
        assert_eq!(first.total_alerts, 1);
        assert_eq!(first.alerts_by_type.risk, 1);
        assert_eq!(first.analyses_completed, 1);

        // same wallet inside every category's window: nothing new fires
        let second = coordinator.coordinate("0xwallet", None).await.unwrap();
        assert_eq!(second.total_alerts, 0);
        assert_eq!(second.alerts_by_type.risk, 0);

        // a different wallet cools down independently
        let other = coordinator.coordinate("0xother", None).await.unwrap();
        assert_eq!(other.total_alerts, 1);
    }

    #[tokio::test]
    async fn test_coordination_persists_consolidated_record() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let coordinator = risk_only_coordinator(&store);
        let alert_store = AlertStore::new(Arc::clone(&store));

        let result = coordinator.coordinate("0xwallet", None).await.unwrap();
        let stored = alert_store.get("0xwallet").await.unwrap().unwrap();
        assert_eq!(stored.total_alerts_triggered, result.total_alerts);
        assert_eq!(stored.raw_alerts.len(), result.all_alerts.len());
        assert_eq!(stored.agent_sections.len(), 1);

        // latest-wins: the second (suppressed) run replaces the record
        coordinator.coordinate("0xwallet", None).await.unwrap();
        let replaced = alert_store.get("0xwallet").await.unwrap().unwrap();
        assert_eq!(replaced.total_alerts_triggered, 0);
        assert_ne!(replaced.alert_id, stored.alert_id);
    }

    #[tokio::test]
    async fn test_analysis_type_filter_selects_tasks() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let coordinator = risk_only_coordinator(&store);

        let selected = coordinator
            .coordinate("0xwallet", Some(&["macro".to_string()]))
            .await
            .unwrap();
        assert_eq!(selected.analyses_completed, 0);
        assert_eq!(selected.total_alerts, 0);
    }

    #[tokio::test]
    async fn test_batch_sums_wallet_totals() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let coordinator = risk_only_coordinator(&store);

        let wallets = vec!["0xaaa".to_string(), "0xbbb".to_string()];
        let batch = coordinator.coordinate_batch(&wallets).await;
        assert_eq!(batch.status, "completed");
        assert_eq!(batch.wallets_processed, 2);
        assert_eq!(batch.total_alerts_triggered, 2);
        assert_eq!(batch.summary.len(), 2);
    }

    #[tokio::test]
    async fn test_task_registry_lifecycle() {
        let registry = TaskRegistry::new();
        let task_id = registry.create().await;

        let record = registry.get(task_id).await.unwrap();
        assert_eq!(record.state, TaskState::Pending);
        assert!(record.progress.is_null());

        registry
            .update(
                task_id,
                TaskState::Processing,
                json!({"status": "Analyzing portfolio risk..."}),
            )
            .await;
        let record = registry.get(task_id).await.unwrap();
        assert_eq!(record.state, TaskState::Processing);

        registry
            .update(task_id, TaskState::Success, json!({"total_alerts": 1}))
            .await;
        let record = registry.get(task_id).await.unwrap();
        assert_eq!(record.state, TaskState::Success);
        assert_eq!(record.progress["total_alerts"], 1);

        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }
}
