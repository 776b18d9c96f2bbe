use anyhow::Context as _;
use bytes::Bytes;

use crate::domain::repository::MessagePublisher;
use crate::error::OutboundError;

/// Core NATS publisher for relayed outbox messages.
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

impl MessagePublisher for NatsPublisher {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), OutboundError> {
        self.client
            .publish(subject.to_owned(), Bytes::from(payload))
            .await
            .with_context(|| format!("publish to {subject}"))?;
        Ok(())
    }
}
