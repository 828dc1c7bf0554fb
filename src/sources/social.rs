use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SourceError;

/// Aggregated social sentiment for one token symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub overall_score: f64,
    pub overall_sentiment: String,
    pub total_posts: u64,
    pub summary: Option<String>,
}

impl SentimentSnapshot {
    pub fn from_score(score: f64, total_posts: u64) -> Self {
        Self {
            overall_score: score,
            overall_sentiment: classify_score(score).to_string(),
            total_posts,
            summary: None,
        }
    }
}

/// Score bands: above 0.2 positive, below -0.2 negative, the rest neutral.
pub fn classify_score(score: f64) -> &'static str {
    if score > 0.2 {
        "positive"
    } else if score < -0.2 {
        "negative"
    } else {
        "neutral"
    }
}

/// Sentiment lookup by token symbol. Scoring internals live behind this
/// seam; the pipeline only consumes the aggregated snapshot.
#[async_trait]
pub trait SocialFeed: Send + Sync {
    async fn token_sentiment(&self, symbol: &str) -> Result<SentimentSnapshot, SourceError>;
}

// ============================================================
// Fixed default implementation
// ============================================================

/// Feed that returns the same snapshot for every symbol. Used when no live
/// sentiment backend is wired, and by tests to script check inputs.
pub struct FixedSentimentFeed {
    score: f64,
    total_posts: u64,
}

impl FixedSentimentFeed {
    pub fn new(score: f64, total_posts: u64) -> Self {
        Self { score, total_posts }
    }

    pub fn neutral() -> Self {
        Self::new(0.0, 0)
    }
}

#[async_trait]
impl SocialFeed for FixedSentimentFeed {
    async fn token_sentiment(&self, _symbol: &str) -> Result<SentimentSnapshot, SourceError> {
        Ok(SentimentSnapshot::from_score(self.score, self.total_posts))
    }
}
