//! Scatter/gather orchestration for classified whale movements.
//!
//! One event fans out to the configured checks (spawned concurrently, each
//! under its own timeout), joins into a consolidated report, gains an AI
//! analyst summary, and is dispatched to the automation and premium
//! channels. Every failure mode is captured as data in the report; nothing
//! propagates past `process_event`.

pub mod checks;
pub mod summary;

pub use checks::{Check, CheckError, ManipulationCheck, MarketCheck, PortfolioCheck, SocialCheck};
pub use summary::{SummaryContext, SummaryGenerator};

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::{self, EventBus};
use crate::classifier::ClassifiedEvent;
use crate::config::OrchestrationConfig;
use crate::sources::TextGenerator;

// ============================================================
// Outcome types
// ============================================================

/// Result of one `process_event` call. Always a value, never a panic or a
/// propagated error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Invalid { error: String },
    Skipped { skipped: bool, reason: String },
    Processed(Box<EventReport>),
}

impl ProcessOutcome {
    fn invalid() -> Self {
        ProcessOutcome::Invalid {
            error: "invalid_event".to_string(),
        }
    }

    fn below_threshold() -> Self {
        ProcessOutcome::Skipped {
            skipped: true,
            reason: "amount_below_threshold".to_string(),
        }
    }

    pub fn report(&self) -> Option<&EventReport> {
        match self {
            ProcessOutcome::Processed(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// Captured result of one scatter check. A failed, panicked, or timed-out
/// check lands here as an error entry and never aborts the event.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn ok(data: Value) -> Self {
        Self {
            status: CheckStatus::Ok,
            data,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            data: Value::Null,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }

    /// Field lookup into a successful check's payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Consolidated findings for one processed whale event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub symbol: String,
    pub amount_usd: f64,
    pub tx: String,
    pub from: String,
    pub to: String,
    pub checks: BTreeMap<String, CheckResult>,
    pub wallet_to_notify: Vec<String>,
    pub ai_summary: String,
    pub dispatched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<String>,
}

// ============================================================
// Orchestrator
// ============================================================

pub struct AlertOrchestrator {
    checks: Vec<Arc<dyn Check>>,
    summary: SummaryGenerator,
    bus: EventBus,
    threshold_usd: f64,
    check_timeout: Duration,
}

impl AlertOrchestrator {
    pub fn new(
        checks: Vec<Arc<dyn Check>>,
        generator: Arc<dyn TextGenerator>,
        bus: EventBus,
        config: &OrchestrationConfig,
    ) -> Self {
        Self {
            checks,
            summary: SummaryGenerator::new(
                generator,
                config.summary_attempts,
                Duration::from_secs(config.summary_backoff_secs),
            ),
            bus,
            threshold_usd: config.workflow_threshold_usd,
            check_timeout: Duration::from_secs(config.check_timeout_secs),
        }
    }

    /// Process one whale movement payload end to end.
    pub async fn process_event(&self, payload: Value) -> ProcessOutcome {
        let event: ClassifiedEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Whale event payload does not parse");
                return ProcessOutcome::invalid();
            }
        };

        tracing::info!(
            symbol = %event.symbol,
            amount_usd = event.amount_usd,
            tx = %event.transaction_hash,
            "Processing whale event"
        );

        if event.amount_usd < self.threshold_usd {
            tracing::info!(
                amount_usd = event.amount_usd,
                threshold_usd = self.threshold_usd,
                "Movement below orchestration threshold; skipping"
            );
            return ProcessOutcome::below_threshold();
        }

        let checks = self.scatter(&event).await;
        let wallet_to_notify = notify_targets(&checks);
        let ai_summary = self.summary.summarize(&summary_context(&event, &checks)).await;

        let mut report = EventReport {
            symbol: event.symbol.clone(),
            amount_usd: event.amount_usd,
            tx: event.transaction_hash.clone(),
            from: event.from_address.clone(),
            to: event.to_address.clone(),
            checks,
            wallet_to_notify,
            ai_summary,
            dispatched: false,
            dispatch_error: None,
        };

        let (dispatched, dispatch_error) = self.dispatch(&report);
        report.dispatched = dispatched;
        report.dispatch_error = dispatch_error;

        ProcessOutcome::Processed(Box::new(report))
    }

    /// Fan the checks out as concurrent tasks and collect every result by
    /// name. One check cannot cancel or starve another.
    async fn scatter(&self, event: &ClassifiedEvent) -> BTreeMap<String, CheckResult> {
        let event = Arc::new(event.clone());
        let handles: Vec<(&'static str, JoinHandle<Result<Value, CheckError>>)> = self
            .checks
            .iter()
            .map(|check| {
                let check = Arc::clone(check);
                let event = Arc::clone(&event);
                let timeout = self.check_timeout;
                let name = check.name();
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, check.run(&event)).await {
                        Ok(result) => result,
                        Err(_) => Err(CheckError::Timeout(timeout.as_secs())),
                    }
                });
                (name, handle)
            })
            .collect();

        let mut results = BTreeMap::new();
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(Ok(data)) => CheckResult::ok(data),
                Ok(Err(e)) => {
                    tracing::warn!(check = name, error = %e, "Check failed");
                    CheckResult::error(e.to_string())
                }
                Err(e) => {
                    tracing::error!(check = name, error = %e, "Check task aborted");
                    CheckResult::error(format!("task aborted: {e}"))
                }
            };
            results.insert(name.to_string(), result);
        }
        results
    }

    /// Publish the alert to both delivery channels. A failure on one does
    /// not skip the other.
    fn dispatch(&self, report: &EventReport) -> (bool, Option<String>) {
        let payload = json!({
            "title": format!("On-chain alert: large {} movement", report.symbol),
            "summary": report.ai_summary,
            "details": report,
        });

        let mut errors = Vec::new();
        for channel in [bus::AUTOMATION, bus::X402] {
            if let Err(e) = self.bus.publish_value(channel, payload.clone()) {
                tracing::error!(channel, error = %e, "Alert dispatch failed");
                errors.push(format!("{channel}: {e}"));
            }
        }

        if errors.is_empty() {
            (true, None)
        } else {
            (false, Some(errors.join("; ")))
        }
    }
}

fn summary_context(
    event: &ClassifiedEvent,
    checks: &BTreeMap<String, CheckResult>,
) -> SummaryContext {
    SummaryContext {
        symbol: event.symbol.clone(),
        price_change_1h_percent: checks
            .get("market")
            .and_then(|c| c.field("price_change_1h_percent"))
            .and_then(Value::as_f64),
        mentions_spike_percent: checks
            .get("social")
            .and_then(|c| c.field("mentions_spike_percent"))
            .and_then(Value::as_u64),
        manipulation_risk: checks
            .get("manipulation")
            .and_then(|c| c.field("risk"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn notify_targets(checks: &BTreeMap<String, CheckResult>) -> Vec<String> {
    checks
        .get("portfolio")
        .and_then(|c| c.field("wallet_to_notify"))
        .and_then(Value::as_array)
        .map(|wallets| {
            wallets
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================
// Consumer loop
// ============================================================

/// Consume classified whale movements and process each in its own task so
/// a slow event cannot delay the next one.
pub async fn run_orchestrator(
    orchestrator: Arc<AlertOrchestrator>,
    bus: EventBus,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let mut rx = bus.subscribe(bus::WHALE_MOVEMENT)?;
    tracing::info!("Alert orchestrator listening for whale movements");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Alert orchestrator shutting down");
                break;
            }
            received = rx.recv() => match received {
                Ok(payload) => {
                    let orchestrator = Arc::clone(&orchestrator);
                    tokio::spawn(async move {
                        orchestrator.process_event(payload).await;
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Orchestrator lagged behind whale movements");
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
    use crate::sources::SourceError;
    use async_trait::async_trait;

    struct StaticCheck {
        name: &'static str,
        payload: Value,
    }

    #[async_trait]
    impl Check for StaticCheck {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _event: &ClassifiedEvent) -> Result<Value, CheckError> {
            Ok(self.payload.clone())
        }
    }

    struct FailingCheck;

    #[async_trait]
    impl Check for FailingCheck {
        fn name(&self) -> &'static str {
            "social"
        }

        async fn run(&self, _event: &ClassifiedEvent) -> Result<Value, CheckError> {
            Err(CheckError::Source(SourceError::BadResponse(
                "social feed unavailable".to_string(),
            )))
        }
    }

    struct SlowCheck;

    #[async_trait]
    impl Check for SlowCheck {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, _event: &ClassifiedEvent) -> Result<Value, CheckError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    struct StaticGenerator {
        text: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for StaticGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Option<String>, SourceError> {
            Ok(self.text.clone())
        }
    }

    fn config(threshold_usd: f64) -> OrchestrationConfig {
        OrchestrationConfig {
            workflow_threshold_usd: threshold_usd,
            check_timeout_secs: 1,
            summary_attempts: 2,
            summary_backoff_secs: 0,
        }
    }

    fn event(amount_usd: f64) -> ClassifiedEvent {
        ClassifiedEvent {
            token: "0xtoken".to_string(),
            symbol: "MNT".to_string(),
            amount: 1_000_000.0,
            amount_usd,
            from_address: "0xfrom".to_string(),
            to_address: "0xto".to_string(),
            transaction_hash: "0xhash".to_string(),
            block_number: 100,
            is_whale: true,
            threshold_used: 100_000.0,
        }
    }

    fn orchestrator(
        checks: Vec<Arc<dyn Check>>,
        generated: Option<&str>,
        bus: &EventBus,
        threshold_usd: f64,
    ) -> AlertOrchestrator {
        AlertOrchestrator::new(
            checks,
            Arc::new(StaticGenerator {
                text: generated.map(str::to_string),
            }),
            bus.clone(),
            &config(threshold_usd),
        )
    }

    #[tokio::test]
    async fn test_threshold_gates_the_workflow() {
        let bus = EventBus::new(16);
        let payload = serde_json::to_value(event(3_000_000.0)).unwrap();

        // 3M against a 2M threshold proceeds
        let low = orchestrator(vec![], Some("summary"), &bus, 2_000_000.0);
        let outcome = low.process_event(payload.clone()).await;
        assert!(outcome.report().is_some());

        // the same event against a 5M threshold is skipped
        let high = orchestrator(vec![], Some("summary"), &bus, 5_000_000.0);
        let outcome = high.process_event(payload).await;
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"skipped": true, "reason": "amount_below_threshold"})
        );
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_invalid() {
        let bus = EventBus::new(16);
        let orchestrator = orchestrator(vec![], Some("summary"), &bus, 2_000_000.0);

        let outcome = orchestrator.process_event(json!({"nonsense": true})).await;
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({"error": "invalid_event"}));
    }

    #[tokio::test]
    async fn test_failed_check_is_captured_and_event_still_dispatches() {
        let bus = EventBus::new(16);
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(StaticCheck {
                name: "market",
                payload: json!({
                    "price_change_1h_percent": 4.2,
                    "price": 1.25,
                    "market_confirmed": true,
                }),
            }),
            Arc::new(FailingCheck),
            Arc::new(StaticCheck {
                name: "manipulation",
                payload: json!({"recent_similar_movements": 0, "risk": "low"}),
            }),
            Arc::new(StaticCheck {
                name: "portfolio",
                payload: json!({"tracked_wallets": 1, "wallet_to_notify": ["0xholder"]}),
            }),
        ];

        let mut automation = bus.subscribe(bus::AUTOMATION).unwrap();
        let mut premium = bus.subscribe(bus::X402).unwrap();

        let orchestrator = orchestrator(checks, Some("Generated summary."), &bus, 2_000_000.0);
        let outcome = orchestrator
            .process_event(serde_json::to_value(event(3_000_000.0)).unwrap())
            .await;

        let report = outcome.report().unwrap();
        assert!(report.checks["market"].is_ok());
        assert!(report.checks["manipulation"].is_ok());
        assert_eq!(report.checks["social"].status, CheckStatus::Error);
        assert!(report.checks["social"]
            .error
            .as_deref()
            .unwrap()
            .contains("social feed unavailable"));
        assert_eq!(report.wallet_to_notify, vec!["0xholder".to_string()]);
        assert_eq!(report.ai_summary, "Generated summary.");
        assert!(report.dispatched);
        assert!(report.dispatch_error.is_none());

        // both delivery channels got the same alert payload
        for rx in [&mut automation, &mut premium] {
            let alert = rx.recv().await.unwrap();
            assert_eq!(alert["title"], "On-chain alert: large MNT movement");
            assert_eq!(alert["summary"], "Generated summary.");
            assert_eq!(alert["details"]["checks"]["social"]["status"], "error");
        }
    }

    #[tokio::test]
    async fn test_empty_generator_falls_back_to_template() {
        let bus = EventBus::new(16);
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(StaticCheck {
                name: "market",
                payload: json!({"price_change_1h_percent": 4.2, "market_confirmed": true}),
            }),
            Arc::new(StaticCheck {
                name: "manipulation",
                payload: json!({"recent_similar_movements": 3, "risk": "medium"}),
            }),
        ];

        let orchestrator = orchestrator(checks, None, &bus, 2_000_000.0);
        let outcome = orchestrator
            .process_event(serde_json::to_value(event(3_000_000.0)).unwrap())
            .await;

        let report = outcome.report().unwrap();
        assert_eq!(
            report.ai_summary,
            "Smart wallets accumulating MNT. Price +4.2%, high social traction, medium manipulation risk."
        );
    }

    #[tokio::test]
    async fn test_slow_check_times_out_without_blocking_others() {
        let bus = EventBus::new(16);
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(SlowCheck),
            Arc::new(StaticCheck {
                name: "market",
                payload: json!({"market_confirmed": false}),
            }),
        ];

        let orchestrator = orchestrator(checks, Some("summary"), &bus, 2_000_000.0);
        let outcome = orchestrator
            .process_event(serde_json::to_value(event(3_000_000.0)).unwrap())
            .await;

        let report = outcome.report().unwrap();
        assert_eq!(report.checks["slow"].status, CheckStatus::Error);
        assert!(report.checks["slow"]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
        assert!(report.checks["market"].is_ok());
    }

    #[tokio::test]
    async fn test_consumer_loop_processes_published_movements() {
        let bus = EventBus::new(16);
        let orchestrator = Arc::new(orchestrator(vec![], Some("loop summary"), &bus, 2_000_000.0));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_orchestrator(
            Arc::clone(&orchestrator),
            bus.clone(),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut automation = bus.subscribe(bus::AUTOMATION).unwrap();
        bus.publish(bus::WHALE_MOVEMENT, &event(3_000_000.0)).unwrap();

        let alert = tokio::time::timeout(Duration::from_secs(2), automation.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alert["title"], "On-chain alert: large MNT movement");

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
