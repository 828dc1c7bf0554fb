//! The per-wallet analysis task group: risk, social, and macro.
//!
//! Each task runs one analysis, checks its alert triggers, and reports
//! back to the coordinator. A task captures its own failures; the group
//! never sees a panic or a propagated error.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::alerts::{Alert, AlertManager, AlertType, Severity};
use crate::sources::{
    analyze_indicators, MacroFeed, PortfolioSource, RiskAssessment, RiskScorer, SocialFeed,
    SourceError,
};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Outcome of one analysis task inside a coordination run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub agent: String,
    pub status: TaskStatus,
    pub alerts: Vec<Alert>,
    pub metrics: Value,
    pub summary: String,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskReport {
    pub fn failed(agent: &str, error: impl Into<String>) -> Self {
        Self {
            agent: agent.to_string(),
            status: TaskStatus::Failed,
            alerts: Vec::new(),
            metrics: Value::Null,
            summary: String::new(),
            recommendations: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// One analysis in the coordination task group. `run` always produces a
/// report; failures become `status: failed` entries.
#[async_trait]
pub trait AnalysisTask: Send + Sync {
    fn agent(&self) -> &'static str;
    async fn run(&self, wallet: &str) -> TaskReport;
}

// ============================================================
// Risk task
// ============================================================

pub struct RiskTask {
    portfolios: Arc<dyn PortfolioSource>,
    scorer: Arc<dyn RiskScorer>,
    alerts: AlertManager,
}

impl RiskTask {
    pub fn new(
        portfolios: Arc<dyn PortfolioSource>,
        scorer: Arc<dyn RiskScorer>,
        alerts: AlertManager,
    ) -> Self {
        Self {
            portfolios,
            scorer,
            alerts,
        }
    }

    async fn analyze(&self, wallet: &str) -> Result<TaskReport, TaskError> {
        tracing::info!(wallet = %wallet, "Running risk analysis");

        let holdings = self.portfolios.holdings(wallet).await?;
        let assessment = self.scorer.assess(&holdings, None).await?;
        let triggered = self.alerts.check_risk_alerts(wallet, &assessment).await?;

        tracing::info!(
            wallet = %wallet,
            risk_score = assessment.risk_score,
            triggered = triggered.len(),
            "Risk analysis completed"
        );

        let alerts = match merge_risk_alerts(wallet, &assessment, &triggered) {
            Some(merged) => vec![merged],
            None => Vec::new(),
        };

        Ok(TaskReport {
            agent: self.agent().to_string(),
            status: TaskStatus::Completed,
            alerts,
            metrics: json!({
                "risk_score": assessment.risk_score,
                "risk_level": assessment.risk_level,
                "market_condition": assessment.market_condition,
                "holdings_count": holdings.len(),
            }),
            summary: format!(
                "Risk score {:.1} ({})",
                assessment.risk_score, assessment.risk_level
            ),
            recommendations: assessment.recommendations.clone(),
            error: None,
        })
    }
}

#[async_trait]
impl AnalysisTask for RiskTask {
    fn agent(&self) -> &'static str {
        "risk"
    }

    async fn run(&self, wallet: &str) -> TaskReport {
        match self.analyze(wallet).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(wallet = %wallet, error = %e, "Risk analysis failed");
                TaskReport::failed(self.agent(), e.to_string())
            }
        }
    }
}

/// Fold the triggered risk categories into one aggregated alert at the
/// highest observed severity. `None` when nothing fired.
fn merge_risk_alerts(
    wallet: &str,
    assessment: &RiskAssessment,
    triggered: &[Alert],
) -> Option<Alert> {
    if triggered.is_empty() {
        return None;
    }

    let max_severity = triggered
        .iter()
        .map(|a| a.severity)
        .max()
        .unwrap_or(Severity::Info);

    let mut lines: Vec<String> = triggered
        .iter()
        .map(|a| format!("- {}: {}", a.title, a.message))
        .collect();
    let mut message = format!(
        "Your portfolio has triggered {} risk alert(s):\n\n{}",
        triggered.len(),
        lines.join("\n")
    );
    if !assessment.recommendations.is_empty() {
        lines = assessment
            .recommendations
            .iter()
            .map(|r| format!("- {r}"))
            .collect();
        message.push_str("\n\nRecommended Actions:\n");
        message.push_str(&lines.join("\n"));
    }

    let mut merged = Alert::new(
        AlertType::HighRiskScore,
        &format!(
            "Portfolio Risk Assessment - {} Risk Factor(s) Detected",
            triggered.len()
        ),
        &message,
        wallet,
        assessment.risk_score,
        json!({
            "alerts_count": triggered.len(),
            "risk_score": assessment.risk_score,
            "risk_level": assessment.risk_level,
            "risk_factors": assessment.factors,
            "market_condition": assessment.market_condition,
            "consolidated_from": triggered.len(),
        }),
        "risk_agent",
    );
    merged.severity = max_severity;
    Some(merged)
}

// ============================================================
// Social task
// ============================================================

/// Sentiment over the wallet's largest holding; wallets with no holdings
/// fall back to the configured default symbol.
pub struct SocialTask {
    portfolios: Arc<dyn PortfolioSource>,
    feed: Arc<dyn SocialFeed>,
    default_symbol: String,
}

impl SocialTask {
    pub fn new(
        portfolios: Arc<dyn PortfolioSource>,
        feed: Arc<dyn SocialFeed>,
        default_symbol: String,
    ) -> Self {
        Self {
            portfolios,
            feed,
            default_symbol,
        }
    }

    async fn analyze(&self, wallet: &str) -> Result<TaskReport, TaskError> {
        let holdings = self.portfolios.holdings(wallet).await?;
        let symbol = holdings
            .iter()
            .max_by(|a, b| a.value_usd.total_cmp(&b.value_usd))
            .map(|h| h.symbol.clone())
            .unwrap_or_else(|| self.default_symbol.clone());

        tracing::info!(wallet = %wallet, symbol = %symbol, "Running social sentiment analysis");
        let snapshot = self.feed.token_sentiment(&symbol).await?;

        Ok(TaskReport {
            agent: self.agent().to_string(),
            status: TaskStatus::Completed,
            // extreme-sentiment alerts would go here; the default feed
            // never reaches the extremes
            alerts: Vec::new(),
            metrics: json!({
                "token_symbol": symbol,
                "overall_score": snapshot.overall_score,
                "trend": snapshot.overall_sentiment,
                "total_posts": snapshot.total_posts,
            }),
            summary: format!(
                "Sentiment for {}: {} (score {:.2})",
                symbol, snapshot.overall_sentiment, snapshot.overall_score
            ),
            recommendations: Vec::new(),
            error: None,
        })
    }
}

#[async_trait]
impl AnalysisTask for SocialTask {
    fn agent(&self) -> &'static str {
        "social"
    }

    async fn run(&self, wallet: &str) -> TaskReport {
        match self.analyze(wallet).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(wallet = %wallet, error = %e, "Social analysis failed");
                TaskReport::failed(self.agent(), e.to_string())
            }
        }
    }
}

// ============================================================
// Macro task
// ============================================================

pub struct MacroTask {
    feed: Arc<dyn MacroFeed>,
    alerts: AlertManager,
}

impl MacroTask {
    pub fn new(feed: Arc<dyn MacroFeed>, alerts: AlertManager) -> Self {
        Self { feed, alerts }
    }

    async fn analyze(&self, wallet: &str) -> Result<TaskReport, TaskError> {
        tracing::info!(wallet = %wallet, "Running macro market analysis");

        let indicators = self.feed.indicators().await?;
        let analysis = analyze_indicators(indicators);
        let alerts = self.alerts.check_macro_alerts(wallet, &analysis).await?;

        tracing::info!(
            wallet = %wallet,
            market_condition = %analysis.market_condition,
            triggered = alerts.len(),
            "Macro analysis completed"
        );

        Ok(TaskReport {
            agent: self.agent().to_string(),
            status: TaskStatus::Completed,
            alerts,
            metrics: json!({
                "market_condition": analysis.market_condition,
                "risk_level": analysis.risk_level,
                "correlation_risk_score": analysis.correlation_risk_score,
                "btc_correlation": analysis.btc_correlation,
            }),
            summary: format!(
                "Market condition: {} ({} risk)",
                analysis.market_condition, analysis.risk_level
            ),
            recommendations: Vec::new(),
            error: None,
        })
    }
}

#[async_trait]
impl AnalysisTask for MacroTask {
    fn agent(&self) -> &'static str {
        "macro"
    }

    async fn run(&self, wallet: &str) -> TaskReport {
        match self.analyze(wallet).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(wallet = %wallet, error = %e, "Macro analysis failed");
                TaskReport::failed(self.agent(), e.to_string())
            }
        }
    }
}
