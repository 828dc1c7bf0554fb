//! Market-structure indicators and the correlation analysis derived from
//! them. The correlation score feeds the risk scorer at 10% weight and the
//! market-stress alert trigger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SourceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacroIndicators {
    pub btc_dominance: f64,
    pub dxy_index: f64,
    pub eth_btc_ratio: f64,
}

impl Default for MacroIndicators {
    fn default() -> Self {
        Self {
            btc_dominance: 50.0,
            dxy_index: 100.0,
            eth_btc_ratio: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroAnalysis {
    pub market_condition: String,
    pub risk_level: String,
    pub correlation_risk_score: f64,
    pub btc_correlation: f64,
    pub indicators: MacroIndicators,
}

/// Correlation hypothesis: BTC dominance normalized against a 60% ceiling.
/// Below 0.4 capital rotates healthily; above 0.7 the market moves as one
/// block and whale exits hit everything at once.
pub fn analyze_indicators(indicators: MacroIndicators) -> MacroAnalysis {
    let correlation = (indicators.btc_dominance / 60.0).min(1.0);

    let (condition, risk_level, score) = if correlation < 0.4 {
        ("healthy_rotation", "low", 15.0)
    } else if correlation < 0.7 {
        ("neutral_consolidation", "medium", 40.0)
    } else {
        let score = (70.0 + (correlation - 0.7) * 100.0).min(100.0);
        ("stressed_correlation", "high", score)
    };

    MacroAnalysis {
        market_condition: condition.to_string(),
        risk_level: risk_level.to_string(),
        correlation_risk_score: score,
        btc_correlation: correlation,
        indicators,
    }
}

/// Source of the raw indicator readings.
#[async_trait]
pub trait MacroFeed: Send + Sync {
    async fn indicators(&self) -> Result<MacroIndicators, SourceError>;
}

// ============================================================
// Static default implementation
// ============================================================

/// Feed that always returns the same readings. The defaults describe a
/// neutral market; tests override them to force each condition tier.
pub struct StaticMacroFeed {
    indicators: MacroIndicators,
}

impl StaticMacroFeed {
    pub fn new(indicators: MacroIndicators) -> Self {
        Self { indicators }
    }
}

impl Default for StaticMacroFeed {
    fn default() -> Self {
        Self::new(MacroIndicators::default())
    }
}

#[async_trait]
impl MacroFeed for StaticMacroFeed {
    async fn indicators(&self) -> Result<MacroIndicators, SourceError> {
        Ok(self.indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_dominance(btc_dominance: f64) -> MacroIndicators {
        MacroIndicators {
            btc_dominance,
            ..MacroIndicators::default()
        }
    }

    #[test]
    fn test_healthy_rotation_tier() {
        let analysis = analyze_indicators(with_dominance(20.0));
        assert_eq!(analysis.market_condition, "healthy_rotation");
        assert_eq!(analysis.risk_level, "low");
        assert_eq!(analysis.correlation_risk_score, 15.0);
        assert!((analysis.btc_correlation - 20.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_consolidation_tier() {
        let analysis = analyze_indicators(with_dominance(30.0));
        assert_eq!(analysis.market_condition, "neutral_consolidation");
        assert_eq!(analysis.risk_level, "medium");
        assert_eq!(analysis.correlation_risk_score, 40.0);
    }

    #[test]
    fn test_stressed_tier_scales_with_correlation() {
        let analysis = analyze_indicators(with_dominance(48.0));
        assert_eq!(analysis.market_condition, "stressed_correlation");
        assert_eq!(analysis.risk_level, "high");
        // correlation 0.8 -> 70 + 10
        assert!((analysis.correlation_risk_score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_stressed_score_caps_at_100() {
        let analysis = analyze_indicators(with_dominance(95.0));
        assert!((analysis.btc_correlation - 1.0).abs() < 1e-9);
        assert_eq!(analysis.correlation_risk_score, 100.0);
    }

    #[test]
    fn test_default_indicators_are_stressed() {
        // 50% dominance / 60 ≈ 0.833 puts the default reading in the
        // stressed band with score ≈ 83.3
        let analysis = analyze_indicators(MacroIndicators::default());
        assert_eq!(analysis.market_condition, "stressed_correlation");
        assert!((analysis.correlation_risk_score - (70.0 + (50.0 / 60.0 - 0.7) * 100.0)).abs() < 1e-9);
    }
}
