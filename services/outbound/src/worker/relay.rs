use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, warn};

use crate::domain::repository::{MessagePublisher, OutboxRepository};
use crate::domain::types::{OUTBOX_MAX_ATTEMPTS, OUTBOX_MAX_BACKOFF_SECS, PendingOutboxMessage};
use crate::error::OutboundError;

/// Delay before the next publish attempt: `2^attempts` seconds, capped.
pub fn publish_backoff(attempts: u32) -> Duration {
    Duration::seconds((1_i64 << attempts.min(31)).min(OUTBOX_MAX_BACKOFF_SECS))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub published: usize,
    pub failed: usize,
}

/// Drains due outbox rows onto the bus. Delivery to the bus is
/// at-least-once; consumers dedupe on the idempotency key.
pub struct OutboxRelay<O: OutboxRepository, P: MessagePublisher> {
    pub outbox: O,
    pub publisher: P,
    pub batch_size: u64,
}

impl<O: OutboxRepository, P: MessagePublisher> OutboxRelay<O, P> {
    pub async fn run_once(&self) -> Result<RelayStats, OutboundError> {
        let now = Utc::now();
        let due = self.outbox.fetch_due(now, self.batch_size).await?;
        let mut stats = RelayStats::default();

        for message in due {
            match self.publish(&message).await {
                Ok(()) => {
                    self.outbox.mark_published(message.id, Utc::now()).await?;
                    stats.published += 1;
                }
                Err(e) => {
                    self.record_failure(&message, &format!("{e:#}"), Utc::now())
                        .await?;
                    stats.failed += 1;
                }
            }
        }

        if stats.published + stats.failed > 0 {
            debug!(
                published = stats.published,
                failed = stats.failed,
                "outbox relay pass"
            );
        }
        Ok(stats)
    }

    async fn publish(&self, message: &PendingOutboxMessage) -> Result<(), OutboundError> {
        let bytes = serde_json::to_vec(&message.payload).context("encode outbox payload")?;
        self.publisher.publish(&message.subject, bytes).await
    }

    async fn record_failure(
        &self,
        message: &PendingOutboxMessage,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OutboundError> {
        let attempts = message.attempts + 1;
        let next_attempt_at = if attempts >= OUTBOX_MAX_ATTEMPTS {
            error!(
                outbox_id = %message.id,
                subject = %message.subject,
                attempts,
                error,
                "outbox message abandoned"
            );
            None
        } else {
            let at = now + publish_backoff(attempts);
            warn!(
                outbox_id = %message.id,
                subject = %message.subject,
                attempts,
                next_attempt_at = %at,
                error,
                "outbox publish failed"
            );
            Some(at)
        };
        self.outbox
            .record_failure(message.id, attempts, error, next_attempt_at, now)
            .await
    }
}
