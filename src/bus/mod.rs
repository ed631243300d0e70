//! Event bus - topic-based publish/subscribe over per-user channels
//!
//! Channels are the logical `user:{id}:...` keys from `store::keys`.
//! Events are best-effort UI hints, never the source of truth: the
//! relationship store stays authoritative and subscribers must tolerate
//! duplicate or out-of-order delivery.
//!
//! The wire form is a one-level JSON envelope `{ "event", "data" }`
//! since NATS carries no event name of its own.

pub mod events;
pub mod memory;
pub mod nats;

pub use self::memory::MemoryBus;
pub use self::nats::NatsBus;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::{ParleyError, Result};

/// Named event with a JSON payload, as delivered on a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes> {
        Ok(serde_json::to_vec(self)?.into())
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Derive a bus-safe subject from a logical channel name
///
/// NATS subjects use `.` as the token separator and reject `:`, so the
/// logical key is mangled the same way for every publisher and
/// subscriber.
pub fn to_subject(channel: &str) -> String {
    channel.replace(':', ".")
}

/// Publish/subscribe primitives consumed by the relationship layer
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a named event on a channel (fire-and-forget)
    async fn publish(&self, channel: &str, event: &str, data: Value) -> Result<()>;

    /// Subscribe to a channel
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;
}

/// A live channel subscription
///
/// Dropping the subscription stops future deliveries; `unsubscribe`
/// does so explicitly. In-flight deliveries cannot be recalled.
pub struct Subscription {
    channel: String,
    inner: SubscriptionInner,
}

enum SubscriptionInner {
    Nats(async_nats::Subscriber),
    Memory(broadcast::Receiver<Envelope>),
}

impl Subscription {
    pub(crate) fn nats(channel: String, sub: async_nats::Subscriber) -> Self {
        Self {
            channel,
            inner: SubscriptionInner::Nats(sub),
        }
    }

    pub(crate) fn memory(channel: String, rx: broadcast::Receiver<Envelope>) -> Self {
        Self {
            channel,
            inner: SubscriptionInner::Memory(rx),
        }
    }

    /// The logical channel this subscription is bound to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next delivered envelope, or `None` once the subscription ends
    ///
    /// A malformed payload is logged and skipped rather than surfaced;
    /// one bad delivery must not tear down the feed.
    pub async fn next(&mut self) -> Option<Envelope> {
        loop {
            match &mut self.inner {
                SubscriptionInner::Nats(sub) => match sub.next().await {
                    Some(message) => match Envelope::from_bytes(&message.payload) {
                        Ok(envelope) => return Some(envelope),
                        Err(e) => {
                            warn!(channel = %self.channel, error = %e, "Dropping malformed event payload");
                            continue;
                        }
                    },
                    None => return None,
                },
                SubscriptionInner::Memory(rx) => match rx.recv().await {
                    Ok(envelope) => return Some(envelope),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(channel = %self.channel, missed, "Subscription lagged, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Stop future deliveries
    pub async fn unsubscribe(self) -> Result<()> {
        match self.inner {
            SubscriptionInner::Nats(mut sub) => sub
                .unsubscribe()
                .await
                .map_err(|e| ParleyError::Bus(format!("Unsubscribe failed: {}", e))),
            SubscriptionInner::Memory(rx) => {
                drop(rx);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_subject_swaps_separators() {
        assert_eq!(to_subject("user:u1:chats"), "user.u1.chats");
        assert_eq!(to_subject("chat:u1--u2"), "chat.u1--u2");
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope::new("new_friend", serde_json::json!({"id": "u2"}));
        let bytes = envelope.to_bytes().unwrap();
        let decoded = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.event, "new_friend");
        assert_eq!(decoded.data["id"], "u2");
    }
}
