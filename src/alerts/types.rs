use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Ordered severity scale; the derive order gives
/// `Info < Warning < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

/// Alert categories with their trigger thresholds and cooldown windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    CriticalRiskScore,
    HighRiskScore,
    ConcentrationWarning,
    LiquidityRisk,
    ContractRisk,
    MarketStress,
}

impl AlertType {
    /// Suffix of the cooldown key (`{wallet}:{category}`).
    pub fn cooldown_category(self) -> &'static str {
        match self {
            AlertType::CriticalRiskScore => "critical_risk",
            AlertType::HighRiskScore => "high_risk",
            AlertType::ConcentrationWarning => "concentration",
            AlertType::LiquidityRisk => "liquidity",
            AlertType::ContractRisk => "contract_risk",
            AlertType::MarketStress => "market_stress",
        }
    }

    /// Score at or above which the category fires.
    pub fn threshold(self) -> f64 {
        match self {
            AlertType::CriticalRiskScore => 85.0,
            AlertType::HighRiskScore => 70.0,
            AlertType::ConcentrationWarning => 60.0,
            AlertType::LiquidityRisk => 60.0,
            AlertType::ContractRisk => 40.0,
            AlertType::MarketStress => 70.0,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            AlertType::CriticalRiskScore => Severity::Critical,
            AlertType::HighRiskScore | AlertType::MarketStress => Severity::High,
            AlertType::ConcentrationWarning
            | AlertType::LiquidityRisk
            | AlertType::ContractRisk => Severity::Warning,
        }
    }

    /// Built-in cooldown window; deployments override per category in
    /// `[cooldowns]` config.
    pub fn default_window_minutes(self) -> u64 {
        match self {
            AlertType::CriticalRiskScore => 60,
            AlertType::HighRiskScore => 120,
            AlertType::ConcentrationWarning => 180,
            AlertType::LiquidityRisk => 240,
            AlertType::ContractRisk => 360,
            AlertType::MarketStress => 120,
        }
    }
}

/// One triggered alert, delivered status included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub wallet_address: Option<String>,
    pub current_value: f64,
    pub threshold: f64,
    pub details: Value,
    pub triggered_by: String,
    pub delivered: bool,
    pub delivery_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Severity and threshold derive from the type; a fresh alert is
    /// undelivered.
    pub fn new(
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
        wallet_address: &str,
        current_value: f64,
        details: Value,
        triggered_by: &str,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4().to_string(),
            alert_type,
            severity: alert_type.severity(),
            title: title.into(),
            message: message.into(),
            wallet_address: Some(wallet_address.to_string()),
            current_value,
            threshold: alert_type.threshold(),
            details,
            triggered_by: triggered_by.to_string(),
            delivered: false,
            delivery_method: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-agent slice of a consolidated alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub agent: String,
    pub summary: String,
    pub alerts_triggered: usize,
    pub metrics: Value,
}

/// One record per wallet in the alert store; replaced wholesale on each
/// coordination run (latest-wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedAlert {
    pub alert_id: String,
    pub wallet_address: String,
    pub title: String,
    pub overall_severity: Severity,
    pub agent_sections: Vec<AgentSection>,
    pub recommendations: Vec<String>,
    pub total_alerts_triggered: usize,
    pub timestamp: DateTime<Utc>,
    pub raw_alerts: Vec<Alert>,
}
