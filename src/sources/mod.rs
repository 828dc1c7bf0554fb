//! External collaborators behind trait seams: market price, portfolio
//! holdings and history, social sentiment, macro indicators, the risk
//! scorer, and the generative-text API.
//!
//! The pipeline only ever sees the traits; deployments wire the HTTP
//! implementations and tests inject scripted fakes.

pub mod llm;
pub mod macro_feed;
pub mod portfolio;
pub mod price;
pub mod risk;
pub mod social;

pub use llm::{GeminiClient, TextGenerator};
pub use macro_feed::{analyze_indicators, MacroAnalysis, MacroFeed, MacroIndicators, StaticMacroFeed};
pub use portfolio::{Holding, PortfolioSource, SimApiClient, TxSummary};
pub use price::{DexScreenerFeed, PriceFeed, PriceQuote};
pub use risk::{HeuristicRiskScorer, RiskAssessment, RiskFactors, RiskScorer};
pub use social::{FixedSentimentFeed, SentimentSnapshot, SocialFeed};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    BadResponse(String),
}
