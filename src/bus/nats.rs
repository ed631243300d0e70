//! NATS event bus

use async_nats::ConnectOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::{to_subject, Envelope, EventBus, Subscription};
use crate::config::NatsArgs;
use crate::types::{ParleyError, Result};

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to NATS
    ///
    /// Fails fast if the server is unreachable; reconnection is handled
    /// by the client after the initial successful connection.
    pub async fn connect(args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", args.nats_url);

        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| ParleyError::Bus(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self { client })
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, channel: &str, event: &str, data: Value) -> Result<()> {
        let payload = Envelope::new(event, data).to_bytes()?;
        self.client
            .publish(to_subject(channel), payload)
            .await
            .map_err(|e| ParleyError::Bus(format!("Publish failed: {}", e)))
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let sub = self
            .client
            .subscribe(to_subject(channel))
            .await
            .map_err(|e| ParleyError::Bus(format!("Subscribe failed: {}", e)))?;
        Ok(Subscription::nats(channel.to_string(), sub))
    }
}
