//! In-process event bus
//!
//! Dev-mode fallback when NATS is unreachable, and the bus used by unit
//! tests. One broadcast channel per logical channel name; publishing to
//! a channel with no subscribers is a silent no-op, matching the
//! fire-and-forget contract.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::{Envelope, EventBus, Subscription};
use crate::types::Result;

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast-backed bus for a single process
#[derive(Default)]
pub struct MemoryBus {
    channels: RwLock<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, channel: &str, event: &str, data: Value) -> Result<()> {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(channel) {
            // Err means no live subscribers; fire-and-forget
            let _ = tx.send(Envelope::new(event, data));
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(Subscription::memory(channel.to_string(), tx.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("user:u1:chats").await.unwrap();

        bus.publish("user:u1:chats", "new_message", json!({"text": "hi"}))
            .await
            .unwrap();

        let envelope = sub.next().await.unwrap();
        assert_eq!(envelope.event, "new_message");
        assert_eq!(envelope.data["text"], "hi");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = MemoryBus::new();
        bus.publish("user:u1:chats", "new_message", json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let bus = MemoryBus::new();
        let mut chats = bus.subscribe("user:u1:chats").await.unwrap();
        let mut friends = bus.subscribe("user:u1:friends").await.unwrap();

        bus.publish("user:u1:friends", "new_friend", json!({"id": "u2"}))
            .await
            .unwrap();

        let envelope = friends.next().await.unwrap();
        assert_eq!(envelope.event, "new_friend");

        // Nothing was published on the chats channel
        bus.publish("user:u1:chats", "new_message", json!({"text": "x"}))
            .await
            .unwrap();
        let envelope = chats.next().await.unwrap();
        assert_eq!(envelope.event, "new_message");
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe("user:u1:chats").await.unwrap();
        sub.unsubscribe().await.unwrap();

        // No receiver left; publish must not fail
        bus.publish("user:u1:chats", "new_message", json!({}))
            .await
            .unwrap();
    }
}
