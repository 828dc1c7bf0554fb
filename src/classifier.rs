//! Whale classification: per-symbol USD thresholds applied to decoded
//! transfers coming off the `onchain` channel.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::bus::{self, EventBus};
use crate::movements::{impact_score, MovementLog, WhaleMovementRecord};
use crate::watcher::types::TransferEvent;

/// Applied when neither the symbol nor a `default` entry is configured.
pub const DEFAULT_THRESHOLD_USD: f64 = 100_000.0;

/// A transfer with its whale verdict attached. Carries everything the
/// orchestration workflow needs without another chain lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub token: String,
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: f64,
    pub from_address: String,
    pub to_address: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub is_whale: bool,
    pub threshold_used: f64,
}

/// Pure threshold lookup; no clock, no store, no side effects.
#[derive(Clone)]
pub struct WhaleClassifier {
    thresholds: HashMap<String, f64>,
}

impl WhaleClassifier {
    pub fn new(thresholds: HashMap<String, f64>) -> Self {
        Self { thresholds }
    }

    /// Symbol entry, then the `default` entry, then the built-in floor.
    pub fn threshold_for(&self, symbol: &str) -> f64 {
        self.thresholds
            .get(symbol)
            .or_else(|| self.thresholds.get("default"))
            .copied()
            .unwrap_or(DEFAULT_THRESHOLD_USD)
    }

    /// The boundary is inclusive: a transfer exactly at the threshold is a
    /// whale movement.
    pub fn classify(&self, event: TransferEvent) -> ClassifiedEvent {
        let threshold = self.threshold_for(&event.symbol);
        ClassifiedEvent {
            is_whale: event.amount_usd >= threshold,
            threshold_used: threshold,
            token: event.token,
            symbol: event.symbol,
            amount: event.amount,
            amount_usd: event.amount_usd,
            from_address: event.from_address,
            to_address: event.to_address,
            transaction_hash: event.transaction_hash,
            block_number: event.block_number,
        }
    }
}

/// Consumer loop on `onchain`: classify each decoded transfer, and for
/// whales record the movement and publish to `whale_movement` and
/// `smart_money`. Malformed messages are skipped, lag is survived; only
/// cancellation or a closed channel ends the loop.
pub async fn run_classifier(
    classifier: WhaleClassifier,
    bus: EventBus,
    movements: MovementLog,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let mut rx = bus.subscribe(bus::ONCHAIN)?;
    tracing::info!("Classifier agent subscribed to onchain channel");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Classifier agent shutting down");
                break;
            }
            message = rx.recv() => match message {
                Ok(value) => {
                    let event: TransferEvent = match serde_json::from_value(value) {
                        Ok(event) => event,
                        Err(error) => {
                            tracing::warn!(%error, "Skipping malformed onchain message");
                            continue;
                        }
                    };
                    handle_transfer(&classifier, &bus, &movements, event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Classifier lagged behind onchain channel");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    Ok(())
}

async fn handle_transfer(
    classifier: &WhaleClassifier,
    bus: &EventBus,
    movements: &MovementLog,
    event: TransferEvent,
) {
    let classified = classifier.classify(event);
    if !classified.is_whale {
        tracing::debug!(
            symbol = %classified.symbol,
            amount_usd = classified.amount_usd,
            threshold = classified.threshold_used,
            "Transfer below whale threshold"
        );
        return;
    }

    tracing::info!(
        symbol = %classified.symbol,
        amount_usd = classified.amount_usd,
        tx = %classified.transaction_hash,
        "Whale movement detected"
    );

    // History first so the orchestrator's manipulation check can already
    // see this movement (it excludes the event's own hash when counting).
    let record = WhaleMovementRecord {
        token: classified.token.clone(),
        symbol: classified.symbol.clone(),
        amount: classified.amount,
        amount_usd: classified.amount_usd,
        from_address: classified.from_address.clone(),
        to_address: classified.to_address.clone(),
        transaction_hash: classified.transaction_hash.clone(),
        block_number: classified.block_number,
        impact_score: impact_score(classified.amount_usd),
        observed_at: chrono::Utc::now(),
    };
    if let Err(error) = movements.record(&record).await {
        tracing::error!(%error, "Failed to record whale movement");
    }

    for channel in [bus::WHALE_MOVEMENT, bus::SMART_MONEY] {
        if let Err(error) = bus.publish(channel, &classified) {
            tracing::error!(%error, channel, "Failed to publish classified event");
        }
    }
}
