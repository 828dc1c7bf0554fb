//! Portfolio risk scoring behind a trait seam. The default scorer is a
//! weighted heuristic over concentration, liquidity, volatility, contract
//! and market-correlation factors; deployments can swap in a richer model
//! without touching the alert pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::portfolio::Holding;
use super::SourceError;

const WEIGHT_CONCENTRATION: f64 = 0.30;
const WEIGHT_LIQUIDITY: f64 = 0.25;
const WEIGHT_VOLATILITY: f64 = 0.20;
const WEIGHT_CONTRACT: f64 = 0.15;
const WEIGHT_CORRELATION: f64 = 0.10;

/// Holdings below this USD value are treated as thin-liquidity positions.
const LOW_LIQUIDITY_USD: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub concentration: f64,
    pub liquidity: f64,
    pub volatility: f64,
    pub contract: f64,
    pub correlation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: String,
    pub factors: RiskFactors,
    pub market_condition: String,
    pub recommendations: Vec<String>,
}

/// Score bands shared by every scorer implementation.
pub fn risk_level_for(score: f64) -> &'static str {
    if score < 30.0 {
        "low"
    } else if score < 50.0 {
        "medium"
    } else if score < 70.0 {
        "high"
    } else {
        "critical"
    }
}

/// Opaque scorer seam. `market_correlation` comes from the macro analysis
/// when available; `None` falls back to a neutral 0.5 reading.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn assess(
        &self,
        holdings: &[Holding],
        market_correlation: Option<f64>,
    ) -> Result<RiskAssessment, SourceError>;
}

// ============================================================
// Heuristic default implementation
// ============================================================

pub struct HeuristicRiskScorer;

#[async_trait]
impl RiskScorer for HeuristicRiskScorer {
    async fn assess(
        &self,
        holdings: &[Holding],
        market_correlation: Option<f64>,
    ) -> Result<RiskAssessment, SourceError> {
        if holdings.is_empty() {
            return Ok(RiskAssessment {
                risk_score: 0.0,
                risk_level: "low".to_string(),
                factors: RiskFactors::default(),
                market_condition: "unknown".to_string(),
                recommendations: vec!["No assets detected in portfolio.".to_string()],
            });
        }

        let (correlation, condition) = correlation_risk(market_correlation.unwrap_or(0.5));
        let factors = RiskFactors {
            concentration: concentration_score(holdings),
            liquidity: liquidity_score(holdings),
            volatility: volatility_score(holdings),
            contract: contract_score(holdings),
            correlation,
        };

        let score = factors.concentration * WEIGHT_CONCENTRATION
            + factors.liquidity * WEIGHT_LIQUIDITY
            + factors.volatility * WEIGHT_VOLATILITY
            + factors.contract * WEIGHT_CONTRACT
            + factors.correlation * WEIGHT_CORRELATION;

        Ok(RiskAssessment {
            risk_score: score,
            risk_level: risk_level_for(score).to_string(),
            recommendations: recommendations(&factors, holdings, condition),
            factors,
            market_condition: condition.to_string(),
        })
    }
}

/// Herfindahl-Hirschman index over portfolio shares, scaled to 0-100, with
/// a diversification bonus for holding 3+ assets.
fn concentration_score(holdings: &[Holding]) -> f64 {
    let hhi: f64 = holdings
        .iter()
        .map(|h| (h.percent_of_portfolio / 100.0).powi(2))
        .sum();
    let bonus = if holdings.len() >= 5 {
        10.0
    } else if holdings.len() >= 3 {
        5.0
    } else {
        0.0
    };
    (hhi * 100.0 - bonus).max(0.0)
}

fn liquidity_score(holdings: &[Holding]) -> f64 {
    holdings
        .iter()
        .map(|h| {
            // large positions are assumed to sit in markets deep enough
            // to exit; small unknown positions are the risky ones
            let per_asset = if h.value_usd > LOW_LIQUIDITY_USD {
                40.0
            } else {
                70.0
            };
            per_asset * h.percent_of_portfolio / 100.0
        })
        .sum()
}

/// Per-symbol volatility profile on a 0-100 scale; unknown symbols assume
/// high volatility.
fn volatility_profile(symbol: &str) -> f64 {
    match symbol.to_uppercase().as_str() {
        "USDC" | "USDT" => 3.0,
        "DAI" => 5.0,
        "FRAX" => 8.0,
        "BTC" => 30.0,
        "ETH" | "WETH" => 35.0,
        "METH" => 40.0,
        "OP" | "ARB" => 50.0,
        "MNT" => 55.0,
        "MOE" | "FUSION" => 65.0,
        _ => 70.0,
    }
}

fn volatility_score(holdings: &[Holding]) -> f64 {
    holdings
        .iter()
        .map(|h| volatility_profile(&h.symbol) * h.percent_of_portfolio / 100.0)
        .sum()
}

fn contract_score(holdings: &[Holding]) -> f64 {
    holdings
        .iter()
        .map(|h| {
            let known = matches!(
                h.symbol.to_uppercase().as_str(),
                "USDC" | "USDT" | "DAI" | "WETH" | "METH" | "MNT" | "BTC" | "ETH"
            );
            let per_asset = if known { 10.0 } else { 80.0 };
            per_asset * h.percent_of_portfolio / 100.0
        })
        .sum()
}

/// Same tiers as the macro analysis: below 0.4 healthy, 0.4-0.7 neutral,
/// above 0.7 stressed with the score scaling toward 100.
fn correlation_risk(market_correlation: f64) -> (f64, &'static str) {
    if market_correlation < 0.4 {
        (15.0, "healthy_rotation")
    } else if market_correlation < 0.7 {
        (40.0, "neutral_consolidation")
    } else {
        let score = (70.0 + (market_correlation - 0.7) * 100.0).min(100.0);
        (score, "stressed_correlation")
    }
}

fn recommendations(factors: &RiskFactors, holdings: &[Holding], condition: &str) -> Vec<String> {
    let mut out = Vec::new();

    if factors.concentration > 60.0 {
        if let Some(top) = holdings
            .iter()
            .max_by(|a, b| a.percent_of_portfolio.total_cmp(&b.percent_of_portfolio))
        {
            out.push(format!(
                "Critical concentration: {} is {:.1}% of portfolio. Diversify into 3-5 different assets to reduce risk.",
                top.symbol, top.percent_of_portfolio
            ));
        }
    } else if factors.concentration > 40.0 {
        out.push(
            "Moderate concentration detected. Consider spreading holdings across more assets."
                .to_string(),
        );
    }

    if factors.liquidity > 60.0 {
        out.push(
            "Low liquidity exposure. Consider moving positions into deeper markets.".to_string(),
        );
    }

    if factors.volatility > 50.0 {
        out.push(
            "High volatility exposure. Add stablecoin allocation to buffer against sharp price movements."
                .to_string(),
        );
    }

    if factors.contract > 40.0 {
        out.push(
            "Exposure to unrecognized tokens. Review contract audit status before increasing positions."
                .to_string(),
        );
    }

    match condition {
        "stressed_correlation" => out.push(
            "Market correlation above 0.7 indicates herd behavior. Consider reducing overall exposure; high correlation periods often precede volatility."
                .to_string(),
        ),
        "healthy_rotation" => out.push(
            "Low market correlation. Capital is rotating selectively, a good environment for rebalancing."
                .to_string(),
        ),
        _ => {}
    }

    if out.is_empty() {
        out.push(format!(
            "Portfolio risk profile is healthy. Continue monitoring regularly. Market condition: {condition}."
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, value_usd: f64, percent: f64) -> Holding {
        Holding {
            token_address: format!("0x{symbol}"),
            symbol: symbol.to_string(),
            balance: 1.0,
            price_usd: None,
            value_usd,
            percent_of_portfolio: percent,
        }
    }

    #[test]
    fn test_concentration_single_asset_is_maximal() {
        let holdings = vec![holding("MNT", 1_000_000.0, 100.0)];
        assert!((concentration_score(&holdings) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_concentration_diversification_bonus() {
        let holdings: Vec<Holding> = (0..5)
            .map(|i| holding(&format!("T{i}"), 100_000.0, 20.0))
            .collect();
        // HHI = 5 * 0.2^2 = 0.2 -> base 20, bonus 10
        assert!((concentration_score(&holdings) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(risk_level_for(0.0), "low");
        assert_eq!(risk_level_for(29.9), "low");
        assert_eq!(risk_level_for(30.0), "medium");
        assert_eq!(risk_level_for(49.9), "medium");
        assert_eq!(risk_level_for(50.0), "high");
        assert_eq!(risk_level_for(69.9), "high");
        assert_eq!(risk_level_for(70.0), "critical");
    }

    #[test]
    fn test_correlation_tiers() {
        assert_eq!(correlation_risk(0.3), (15.0, "healthy_rotation"));
        assert_eq!(correlation_risk(0.5), (40.0, "neutral_consolidation"));
        let (score, condition) = correlation_risk(0.8);
        assert_eq!(condition, "stressed_correlation");
        assert!((score - 80.0).abs() < 1e-9);
        assert_eq!(correlation_risk(1.0).0, 100.0);
    }

    #[tokio::test]
    async fn test_empty_portfolio_scores_zero() {
        let assessment = HeuristicRiskScorer
            .assess(&[], Some(0.9))
            .await
            .unwrap();
        assert_eq!(assessment.risk_score, 0.0);
        assert_eq!(assessment.risk_level, "low");
        assert_eq!(assessment.market_condition, "unknown");
        assert_eq!(
            assessment.recommendations,
            vec!["No assets detected in portfolio.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_concentrated_unknown_token_scores_high() {
        let holdings = vec![holding("PEPECOPY", 5_000.0, 100.0)];
        let assessment = HeuristicRiskScorer
            .assess(&holdings, Some(0.8))
            .await
            .unwrap();

        // concentration 100, liquidity 70, volatility 70, contract 80,
        // correlation 80 -> 30 + 17.5 + 14 + 12 + 8 = 81.5
        assert!((assessment.risk_score - 81.5).abs() < 1e-9);
        assert_eq!(assessment.risk_level, "critical");
        assert_eq!(assessment.market_condition, "stressed_correlation");
        assert!(!assessment.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_stable_diversified_portfolio_scores_low() {
        let holdings = vec![
            holding("USDC", 400_000.0, 40.0),
            holding("USDT", 300_000.0, 30.0),
            holding("ETH", 200_000.0, 20.0),
            holding("BTC", 50_000.0, 5.0),
            holding("DAI", 50_000.0, 5.0),
        ];
        let assessment = HeuristicRiskScorer
            .assess(&holdings, Some(0.3))
            .await
            .unwrap();

        assert_eq!(assessment.risk_level, "low");
        assert_eq!(assessment.market_condition, "healthy_rotation");
        assert!(assessment.factors.concentration < 30.0);
    }
}
