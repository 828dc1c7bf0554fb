//! Trigger evaluation: risk assessments and macro analyses in, cooldown-gated
//! alerts out.

use serde_json::json;

use crate::config::CooldownConfig;
use crate::sources::{MacroAnalysis, RiskAssessment, RiskFactors};
use crate::store::StoreError;

use super::cooldown::CooldownTracker;
use super::types::{Alert, AlertType};

#[derive(Clone)]
pub struct AlertManager {
    cooldowns: CooldownTracker,
    windows: CooldownConfig,
}

impl AlertManager {
    pub fn new(cooldowns: CooldownTracker, windows: CooldownConfig) -> Self {
        Self { cooldowns, windows }
    }

    fn window_minutes(&self, alert_type: AlertType) -> u64 {
        match alert_type {
            AlertType::CriticalRiskScore => self.windows.critical_risk,
            AlertType::HighRiskScore => self.windows.high_risk,
            AlertType::ConcentrationWarning => self.windows.concentration,
            AlertType::LiquidityRisk => self.windows.liquidity,
            AlertType::ContractRisk => self.windows.contract_risk,
            AlertType::MarketStress => self.windows.market_stress,
        }
    }

    /// Check-and-record in one step; false means the category is still
    /// cooling down for this wallet.
    async fn gate(
        &self,
        wallet: &str,
        alert_type: AlertType,
    ) -> Result<bool, StoreError> {
        let key = format!("{wallet}:{}", alert_type.cooldown_category());
        self.cooldowns
            .try_trigger(&key, self.window_minutes(alert_type))
            .await
    }

    /// Evaluate every risk category against an assessment. The overall
    /// score is an if/else-if pair: a critical score suppressed by its
    /// cooldown does not fall through to the high-risk category.
    pub async fn check_risk_alerts(
        &self,
        wallet: &str,
        assessment: &RiskAssessment,
    ) -> Result<Vec<Alert>, StoreError> {
        let mut triggered = Vec::new();
        let factors = &assessment.factors;
        let score = assessment.risk_score;

        if score >= AlertType::CriticalRiskScore.threshold() {
            if self.gate(wallet, AlertType::CriticalRiskScore).await? {
                triggered.push(critical_risk_alert(wallet, score, factors));
            }
        } else if score >= AlertType::HighRiskScore.threshold()
            && self.gate(wallet, AlertType::HighRiskScore).await?
        {
            triggered.push(high_risk_alert(wallet, score, factors));
        }

        if factors.concentration >= AlertType::ConcentrationWarning.threshold()
            && self.gate(wallet, AlertType::ConcentrationWarning).await?
        {
            triggered.push(concentration_alert(wallet, factors.concentration));
        }

        if factors.liquidity >= AlertType::LiquidityRisk.threshold()
            && self.gate(wallet, AlertType::LiquidityRisk).await?
        {
            triggered.push(liquidity_alert(wallet, factors.liquidity));
        }

        if factors.contract >= AlertType::ContractRisk.threshold()
            && self.gate(wallet, AlertType::ContractRisk).await?
        {
            triggered.push(contract_risk_alert(wallet, factors.contract));
        }

        if (factors.correlation >= AlertType::MarketStress.threshold()
            || assessment.market_condition == "stressed_correlation")
            && self.gate(wallet, AlertType::MarketStress).await?
        {
            triggered.push(market_stress_alert(
                wallet,
                factors.correlation,
                &assessment.market_condition,
                "risk_agent",
            ));
        }

        tracing::info!(
            wallet = %wallet,
            triggered = triggered.len(),
            "Checked risk alert triggers"
        );
        Ok(triggered)
    }

    /// Market-stress trigger fed from the macro analysis directly. Shares
    /// the cooldown category with the risk path, so the two cannot
    /// double-fire for one wallet inside the window.
    pub async fn check_macro_alerts(
        &self,
        wallet: &str,
        analysis: &MacroAnalysis,
    ) -> Result<Vec<Alert>, StoreError> {
        let mut triggered = Vec::new();

        if (analysis.correlation_risk_score >= AlertType::MarketStress.threshold()
            || analysis.market_condition == "stressed_correlation")
            && self.gate(wallet, AlertType::MarketStress).await?
        {
            triggered.push(market_stress_alert(
                wallet,
                analysis.correlation_risk_score,
                &analysis.market_condition,
                "macro_agent",
            ));
        }

        Ok(triggered)
    }
}

// ============================================================
// Alert construction
// ============================================================

fn factor_pairs(factors: &RiskFactors) -> [(&'static str, f64); 5] {
    [
        ("concentration", factors.concentration),
        ("liquidity", factors.liquidity),
        ("volatility", factors.volatility),
        ("contract_risk", factors.contract),
        ("correlation_risk", factors.correlation),
    ]
}

fn main_driver(factors: &RiskFactors) -> (&'static str, f64) {
    factor_pairs(factors)
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or(("concentration", 0.0))
}

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn critical_risk_alert(wallet: &str, score: f64, factors: &RiskFactors) -> Alert {
    let (driver, driver_value) = main_driver(factors);
    Alert::new(
        AlertType::CriticalRiskScore,
        "Critical Portfolio Risk Detected",
        format!(
            "Your portfolio risk score is CRITICAL at {score:.1}/100. \
             Primary concern: {} ({driver_value:.1}). \
             Immediate action recommended to reduce exposure.",
            title_case(driver)
        ),
        wallet,
        score,
        json!({
            "risk_score": score,
            "risk_factors": factors,
            "main_driver": driver,
            "action": "immediate_rebalance_required",
        }),
        "risk_agent",
    )
}

fn high_risk_alert(wallet: &str, score: f64, factors: &RiskFactors) -> Alert {
    Alert::new(
        AlertType::HighRiskScore,
        "High Portfolio Risk",
        format!(
            "Your portfolio risk score is HIGH at {score:.1}/100. \
             Consider reviewing your holdings and rebalancing to reduce risk exposure."
        ),
        wallet,
        score,
        json!({ "risk_factors": factors }),
        "risk_agent",
    )
}

fn concentration_alert(wallet: &str, score: f64) -> Alert {
    Alert::new(
        AlertType::ConcentrationWarning,
        "High Concentration Risk",
        format!(
            "Portfolio concentration is {score:.1}/100. \
             Your holdings are heavily concentrated in few assets. \
             Diversifying into 3-5 assets can reduce risk significantly."
        ),
        wallet,
        score,
        json!({ "recommendation": "diversify_holdings" }),
        "risk_agent",
    )
}

fn liquidity_alert(wallet: &str, score: f64) -> Alert {
    Alert::new(
        AlertType::LiquidityRisk,
        "Liquidity Risk Detected",
        format!(
            "Portfolio liquidity risk is {score:.1}/100. \
             Some assets may have limited liquidity. \
             Consider moving positions into deeper venues."
        ),
        wallet,
        score,
        json!({ "action": "move_to_liquid_venues" }),
        "risk_agent",
    )
}

fn contract_risk_alert(wallet: &str, score: f64) -> Alert {
    Alert::new(
        AlertType::ContractRisk,
        "Smart Contract Risk Exposure",
        format!(
            "Contract risk score is {score:.1}/100. \
             You have exposure to emerging or unaudited protocols. \
             Review audit status and consider established alternatives."
        ),
        wallet,
        score,
        json!({ "action": "review_protocol_safety" }),
        "risk_agent",
    )
}

fn market_stress_alert(wallet: &str, score: f64, condition: &str, triggered_by: &str) -> Alert {
    Alert::new(
        AlertType::MarketStress,
        "Market Stress Detected",
        format!(
            "Market correlation is elevated ({score:.1}/100), indicating {}. \
             High correlation periods often signal fear or herd behavior. \
             Consider reducing overall risk exposure or increasing stablecoin allocation.",
            condition.replace('_', " ")
        ),
        wallet,
        score,
        json!({
            "market_condition": condition,
            "action": "reduce_risk_exposure",
        }),
        triggered_by,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::analyze_indicators;
    use crate::sources::MacroIndicators;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn manager() -> AlertManager {
        let store = Arc::new(MemoryStore::new());
        AlertManager::new(CooldownTracker::new(store), CooldownConfig::default())
    }

    fn assessment(score: f64, factors: RiskFactors, condition: &str) -> RiskAssessment {
        RiskAssessment {
            risk_score: score,
            risk_level: crate::sources::risk::risk_level_for(score).to_string(),
            factors,
            market_condition: condition.to_string(),
            recommendations: vec![],
        }
    }

    fn quiet_factors() -> RiskFactors {
        RiskFactors {
            concentration: 10.0,
            liquidity: 10.0,
            volatility: 10.0,
            contract: 10.0,
            correlation: 15.0,
        }
    }

    #[tokio::test]
    async fn test_no_triggers_below_thresholds() {
        let manager = manager();
        let alerts = manager
            .check_risk_alerts("0xw", &assessment(20.0, quiet_factors(), "healthy_rotation"))
            .await
            .unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_critical_score_fires_once_per_window() {
        let manager = manager();
        let risky = assessment(
            90.0,
            RiskFactors {
                concentration: 95.0,
                ..quiet_factors()
            },
            "neutral_consolidation",
        );

        let first = manager.check_risk_alerts("0xw", &risky).await.unwrap();
        let types: Vec<AlertType> = first.iter().map(|a| a.alert_type).collect();
        assert!(types.contains(&AlertType::CriticalRiskScore));
        assert!(types.contains(&AlertType::ConcentrationWarning));

        // identical re-run inside the window is fully suppressed
        let second = manager.check_risk_alerts("0xw", &risky).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_suppressed_critical_does_not_cascade_to_high() {
        let manager = manager();
        let critical = assessment(90.0, quiet_factors(), "neutral_consolidation");

        let first = manager.check_risk_alerts("0xw", &critical).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].alert_type, AlertType::CriticalRiskScore);

        // still critical, still cooling down: no high_risk fallback either
        let second = manager.check_risk_alerts("0xw", &critical).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_high_score_without_critical() {
        let manager = manager();
        let alerts = manager
            .check_risk_alerts("0xw", &assessment(75.0, quiet_factors(), "neutral_consolidation"))
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HighRiskScore);
        assert_eq!(alerts[0].current_value, 75.0);
    }

    #[tokio::test]
    async fn test_market_stress_on_condition_even_below_score() {
        let manager = manager();
        let stressed = assessment(
            20.0,
            RiskFactors {
                correlation: 50.0,
                ..quiet_factors()
            },
            "stressed_correlation",
        );
        let alerts = manager.check_risk_alerts("0xw", &stressed).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::MarketStress);
    }

    #[tokio::test]
    async fn test_macro_and_risk_share_market_stress_cooldown() {
        let manager = manager();
        let analysis = analyze_indicators(MacroIndicators {
            btc_dominance: 55.0,
            ..MacroIndicators::default()
        });
        assert_eq!(analysis.market_condition, "stressed_correlation");

        let macro_alerts = manager.check_macro_alerts("0xw", &analysis).await.unwrap();
        assert_eq!(macro_alerts.len(), 1);
        assert_eq!(macro_alerts[0].triggered_by, "macro_agent");

        // risk path hits the same cooldown category and is suppressed
        let stressed = assessment(
            20.0,
            RiskFactors {
                correlation: 90.0,
                ..quiet_factors()
            },
            "stressed_correlation",
        );
        let risk_alerts = manager.check_risk_alerts("0xw", &stressed).await.unwrap();
        assert!(risk_alerts.is_empty());
    }

    #[tokio::test]
    async fn test_wallets_do_not_share_cooldowns() {
        let manager = manager();
        let critical = assessment(90.0, quiet_factors(), "neutral_consolidation");
        assert_eq!(manager.check_risk_alerts("0xa", &critical).await.unwrap().len(), 1);
        assert_eq!(manager.check_risk_alerts("0xb", &critical).await.unwrap().len(), 1);
    }

    #[test]
    fn test_main_driver_and_title_case() {
        let factors = RiskFactors {
            concentration: 30.0,
            liquidity: 10.0,
            volatility: 20.0,
            contract: 85.0,
            correlation: 40.0,
        };
        let (driver, value) = main_driver(&factors);
        assert_eq!(driver, "contract_risk");
        assert_eq!(value, 85.0);
        assert_eq!(title_case("contract_risk"), "Contract Risk");
        assert_eq!(title_case("concentration"), "Concentration");
    }
}
