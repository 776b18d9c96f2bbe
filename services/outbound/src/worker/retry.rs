use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::repository::{
    DeliveryRepository, EventLogRepository, TemplateRenderer, TemplateRepository,
};
use crate::domain::types::{DeliveryRequest, OutboundEvent, OutboxMessage, ResolvedContent};
use crate::error::OutboundError;
use crate::usecase::template::TemplateResolver;

/// Picks up failed deliveries whose retry is due and hands them back to the
/// senders through the outbox.
pub struct RetrySweep<L, E, T, R>
where
    L: DeliveryRepository,
    E: EventLogRepository,
    T: TemplateRepository,
    R: TemplateRenderer,
{
    pub deliveries: L,
    pub events: E,
    pub templates: TemplateResolver<T, R>,
    pub subject_prefix: String,
    pub batch_size: u64,
}

impl<L, E, T, R> RetrySweep<L, E, T, R>
where
    L: DeliveryRepository,
    E: EventLogRepository,
    T: TemplateRepository,
    R: TemplateRenderer,
{
    /// One sweep. Returns how many retries this worker claimed.
    pub async fn run_once(&self) -> Result<usize, OutboundError> {
        let now = Utc::now();
        let due = self.deliveries.due_for_retry(now, self.batch_size).await?;
        let mut content_by_event: HashMap<Uuid, Option<(OutboundEvent, ResolvedContent)>> =
            HashMap::new();
        let mut claimed = 0;

        for mut delivery in due {
            let seen_attempt = delivery.attempt_count;
            if !delivery.claim_retry(now).is_applied() {
                continue;
            }

            if !content_by_event.contains_key(&delivery.event_id) {
                let loaded = self.load_content(delivery.event_id).await;
                content_by_event.insert(delivery.event_id, loaded);
            }
            let Some(Some((event, content))) = content_by_event.get(&delivery.event_id) else {
                continue;
            };

            let message = OutboxMessage::delivery_requested(
                &self.subject_prefix,
                &DeliveryRequest::new(&delivery, event, content),
            )?;
            if self
                .deliveries
                .claim_retry(&delivery, seen_attempt, &message)
                .await?
            {
                claimed += 1;
                info!(
                    delivery_id = %delivery.id,
                    channel = %delivery.channel,
                    attempt = delivery.attempt_count,
                    "delivery retry dispatched"
                );
            } else {
                debug!(delivery_id = %delivery.id, "retry already claimed elsewhere");
            }
        }
        Ok(claimed)
    }

    /// A delivery whose content cannot be rebuilt stays due and is tried
    /// again next sweep.
    async fn load_content(&self, event_id: Uuid) -> Option<(OutboundEvent, ResolvedContent)> {
        let event = match self.events.find_by_id(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                warn!(event_id = %event_id, "retry skipped, event missing");
                return None;
            }
            Err(e) => {
                warn!(event_id = %event_id, error = %format!("{e:#}"), "retry skipped, event lookup failed");
                return None;
            }
        };
        match self.templates.resolve(&event).await {
            Ok(content) => Some((event, content)),
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "retry skipped, content unresolved");
                None
            }
        }
    }
}
