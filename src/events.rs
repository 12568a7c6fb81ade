//! Event bus
//!
//! Fire-and-forget broadcast publisher. Delivery is best-effort: publishing
//! with no subscribers is not an error, and slow subscribers may observe
//! lagged drops. Within one rule evaluation, events go out in rule order.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::AnomalyEvent;

pub const ANOMALY_DETECTED: &str = "anomaly.detected";

/// Envelope every bus message travels in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub payload: serde_json::Value,
}

/// Broadcast-backed publisher shared across services
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; send failures (no receivers) are swallowed
    pub fn publish(&self, event: PlatformEvent) {
        let receivers = self.sender.receiver_count();
        tracing::debug!(
            "Publishing event '{}' from {} to {} subscriber(s)",
            event.event_type,
            event.source,
            receivers
        );
        let _ = self.sender.send(event);
    }

    /// Publish an `anomaly.detected` event
    pub fn publish_anomaly(&self, source: &str, anomaly: &AnomalyEvent) {
        let payload = match serde_json::to_value(anomaly) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to serialize anomaly event: {}", e);
                return;
            },
        };
        self.publish(PlatformEvent {
            event_type: ANOMALY_DETECTED.to_string(),
            source: source.to_string(),
            payload,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(PlatformEvent {
            event_type: "test".to_string(),
            source: "tests".to_string(),
            payload: serde_json::Value::Null,
        });
    }

    #[tokio::test]
    async fn test_anomaly_roundtrip() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish_anomaly(
            "rule_engine",
            &AnomalyEvent {
                ontology_id: 1,
                entity_id: None,
                metric_name: "stock_level".to_string(),
                alert_type: "threshold".to_string(),
                severity: "high".to_string(),
                message: "below threshold".to_string(),
                value: 3.0,
                threshold: Some(5.0),
            },
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, ANOMALY_DETECTED);
        assert_eq!(event.payload["metric_name"], "stock_level");
        assert_eq!(event.payload["value"], 3.0);
    }
}
