//! Analyst one-liner for a processed event, with bounded retries against
//! the generative API and a deterministic fallback so the summary is
//! never null.

use std::sync::Arc;
use std::time::Duration;

use crate::sources::TextGenerator;

/// The check figures the prompt and fallback are built from. Missing
/// values (errored or unconfirmed checks) degrade the wording, never the
/// pipeline.
#[derive(Debug, Clone, Default)]
pub struct SummaryContext {
    pub symbol: String,
    pub price_change_1h_percent: Option<f64>,
    pub mentions_spike_percent: Option<u64>,
    pub manipulation_risk: Option<String>,
}

impl SummaryContext {
    pub fn prompt(&self) -> String {
        format!(
            "Market: price_change={}% ; Social: spike={}% ; Manipulation risk={} ; \n\
             Write a one-sentence analyst summary describing the situation for token {}.",
            self.price_change_1h_percent
                .map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            self.mentions_spike_percent
                .map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            self.manipulation_risk.as_deref().unwrap_or("unknown"),
            self.symbol,
        )
    }

    /// Template used when the generator never produces text.
    pub fn fallback(&self) -> String {
        format!(
            "Smart wallets accumulating {}. Price +{}%, high social traction, {} manipulation risk.",
            self.symbol,
            self.price_change_1h_percent.unwrap_or(0.0),
            self.manipulation_risk.as_deref().unwrap_or("unknown"),
        )
    }
}

pub struct SummaryGenerator {
    generator: Arc<dyn TextGenerator>,
    attempts: u32,
    backoff: Duration,
}

impl SummaryGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, attempts: u32, backoff: Duration) -> Self {
        Self {
            generator,
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Up to `attempts` calls with a fixed pause between them (no pause
    /// after the last); empty or failed attempts fall through to the
    /// deterministic template.
    pub async fn summarize(&self, context: &SummaryContext) -> String {
        let prompt = context.prompt();
        for attempt in 1..=self.attempts {
            match self.generator.generate(&prompt).await {
                Ok(Some(text)) => {
                    tracing::debug!(symbol = %context.symbol, attempt, "Summary generated");
                    return text;
                }
                Ok(None) => {
                    tracing::debug!(attempt, "Generator returned no text");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Summary generation attempt failed");
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }
        tracing::info!(symbol = %context.symbol, "Falling back to template summary");
        context.fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<Option<String>, SourceError>>>,
        calls: AtomicU32,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<Option<String>, SourceError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Option<String>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    fn context() -> SummaryContext {
        SummaryContext {
            symbol: "MNT".to_string(),
            price_change_1h_percent: Some(4.2),
            mentions_spike_percent: Some(300),
            manipulation_risk: Some("low".to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_stops_retrying() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(Some(
            "Whales are moving MNT.".to_string(),
        ))]));
        let summary = SummaryGenerator::new(generator.clone(), 4, Duration::from_millis(1));

        let text = summary.summarize(&context()).await;
        assert_eq!(text, "Whales are moving MNT.");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_empty_attempts_fall_back_to_template() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(None),
            Ok(None),
            Ok(None),
            Ok(None),
        ]));
        let summary = SummaryGenerator::new(generator.clone(), 4, Duration::from_millis(1));

        let text = summary.summarize(&context()).await;
        assert_eq!(
            text,
            "Smart wallets accumulating MNT. Price +4.2%, high social traction, low manipulation risk."
        );
        assert_eq!(generator.calls(), 4);
    }

    #[tokio::test]
    async fn test_error_then_success_recovers() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(SourceError::BadResponse("overloaded".to_string())),
            Ok(Some("Recovered.".to_string())),
        ]));
        let summary = SummaryGenerator::new(generator.clone(), 4, Duration::from_millis(1));

        let text = summary.summarize(&context()).await;
        assert_eq!(text, "Recovered.");
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn test_fallback_renders_missing_figures() {
        let context = SummaryContext {
            symbol: "MNT".to_string(),
            price_change_1h_percent: None,
            mentions_spike_percent: None,
            manipulation_risk: None,
        };
        assert_eq!(
            context.fallback(),
            "Smart wallets accumulating MNT. Price +0%, high social traction, unknown manipulation risk."
        );
        let prompt = context.prompt();
        assert!(prompt.contains("price_change=unknown%"));
        assert!(prompt.contains("for token MNT"));
    }
}
