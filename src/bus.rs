//! Named-channel publish/subscribe fabric connecting the pipeline stages.
//!
//! Delivery is at-most-once to currently-subscribed consumers: no replay, no
//! persistence. A consumer that falls behind the channel capacity is lagged
//! and skips ahead; consumer loops treat that as a warning, not a stop.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Decoded transfers from the chain listener.
pub const ONCHAIN: &str = "onchain";
/// Classified whale movements for downstream agents.
pub const WHALE_MOVEMENT: &str = "whale_movement";
/// Alert payloads for the automation/digest delivery path.
pub const AUTOMATION: &str = "automation";
/// Alert payloads for the premium delivery path.
pub const X402: &str = "x402";
/// Classified whale movements fanned out to websocket sessions.
pub const SMART_MONEY: &str = "smart_money";

/// The fixed channel taxonomy; publishing anywhere else is an error.
pub const CHANNELS: [&str; 5] = [ONCHAIN, WHALE_MOVEMENT, AUTOMATION, X402, SMART_MONEY];

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct EventBus {
    channels: Arc<HashMap<&'static str, broadcast::Sender<Value>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let mut channels = HashMap::new();
        for name in CHANNELS {
            let (tx, _) = broadcast::channel(capacity);
            channels.insert(name, tx);
        }
        Self {
            channels: Arc::new(channels),
        }
    }

    /// Fire-and-forget publish. Returns the number of consumers the message
    /// was delivered to; zero subscribers is a successful no-op.
    pub fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> Result<usize, BusError> {
        self.publish_value(channel, serde_json::to_value(payload)?)
    }

    pub fn publish_value(&self, channel: &str, payload: Value) -> Result<usize, BusError> {
        let tx = self
            .channels
            .get(channel)
            .ok_or_else(|| BusError::UnknownChannel(channel.to_string()))?;
        match tx.send(payload) {
            Ok(delivered) => Ok(delivered),
            // A send error only means nobody is subscribed right now.
            Err(_) => Ok(0),
        }
    }

    pub fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<Value>, BusError> {
        self.channels
            .get(channel)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| BusError::UnknownChannel(channel.to_string()))
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe(ONCHAIN).unwrap();
        let delivered = bus.publish(ONCHAIN, &json!({"amount_usd": 1.0})).unwrap();
        assert_eq!(delivered, 1);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg["amount_usd"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_channel_rejected() {
        let bus = EventBus::new(16);
        assert!(matches!(
            bus.publish("mystery", &json!({})),
            Err(BusError::UnknownChannel(_))
        ));
        assert!(bus.subscribe("mystery").is_err());
    }

    #[tokio::test]
    async fn test_no_subscribers_is_not_an_error() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(X402, &json!({"title": "t"})).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let bus = EventBus::new(16);
        bus.publish(WHALE_MOVEMENT, &json!({"seq": 1})).unwrap();
        let mut rx = bus.subscribe(WHALE_MOVEMENT).unwrap();
        bus.publish(WHALE_MOVEMENT, &json!({"seq": 2})).unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg["seq"], 2);
    }

    #[tokio::test]
    async fn test_lagged_consumer_skips_and_resumes() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe(SMART_MONEY).unwrap();
        for seq in 0..5 {
            bus.publish(SMART_MONEY, &json!({"seq": seq})).unwrap();
        }
        // Overrun: the receiver reports how far it lagged, then resumes with
        // the oldest retained message.
        match rx.recv().await {
            Err(RecvError::Lagged(skipped)) => assert_eq!(skipped, 3),
            other => panic!("expected lag, got {other:?}"),
        }
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg["seq"], 3);
    }
}
