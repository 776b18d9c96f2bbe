use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::delivery::{DeliveryOutcome, OutboundDelivery, Transition};
use crate::domain::repository::{
    DeliveryRepository, EventLogRepository, TemplateRenderer, TemplateRepository,
};
use crate::domain::types::{DeliveryRequest, OutboxMessage};
use crate::error::OutboundError;
use crate::usecase::template::TemplateResolver;

/// A sender reports it started working on a delivery.
pub struct BeginAttemptUseCase<L: DeliveryRepository> {
    pub deliveries: L,
}

impl<L: DeliveryRepository> BeginAttemptUseCase<L> {
    pub async fn execute(&self, delivery_id: Uuid) -> Result<OutboundDelivery, OutboundError> {
        let mut delivery = self
            .deliveries
            .find_by_id(delivery_id)
            .await?
            .ok_or(OutboundError::DeliveryNotFound)?;

        match delivery.begin_attempt(Utc::now()) {
            Transition::Applied => self.deliveries.save_state(&delivery).await?,
            Transition::Ignored(reason) => {
                info!(
                    delivery_id = %delivery.id,
                    status = %delivery.status(),
                    reason,
                    "begin attempt ignored"
                );
            }
        }
        Ok(delivery)
    }
}

pub struct UpdateStatusInput {
    pub delivery_id: Uuid,
    pub outcome: DeliveryOutcome,
    pub external_message_id: Option<String>,
}

/// Sender callback with the outcome of an attempt. A failed send is data,
/// never an error.
pub struct UpdateStatusUseCase<L: DeliveryRepository> {
    pub deliveries: L,
}

impl<L: DeliveryRepository> UpdateStatusUseCase<L> {
    pub async fn execute(
        &self,
        input: UpdateStatusInput,
    ) -> Result<OutboundDelivery, OutboundError> {
        let mut delivery = self
            .deliveries
            .find_by_id(input.delivery_id)
            .await?
            .ok_or(OutboundError::DeliveryNotFound)?;

        let transition =
            delivery.record_outcome(input.outcome, input.external_message_id, Utc::now());
        match transition {
            Transition::Applied => {
                self.deliveries.save_state(&delivery).await?;
                if let Some(next_retry_at) = delivery.state.next_retry_at() {
                    info!(
                        delivery_id = %delivery.id,
                        channel = %delivery.channel,
                        attempt = delivery.attempt_count,
                        next_retry_at = %next_retry_at,
                        "delivery failed, retry scheduled"
                    );
                } else {
                    info!(
                        delivery_id = %delivery.id,
                        channel = %delivery.channel,
                        attempt = delivery.attempt_count,
                        status = %delivery.status(),
                        "delivery status updated"
                    );
                }
            }
            Transition::Ignored(reason) => {
                info!(
                    delivery_id = %delivery.id,
                    status = %delivery.status(),
                    reason,
                    "late status report ignored"
                );
            }
        }
        Ok(delivery)
    }
}

/// Operator re-queue of a failed delivery, written with a fresh outbox
/// message in one transaction.
pub struct RequeueDeliveryUseCase<L, E, T, R>
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
}

impl<L, E, T, R> RequeueDeliveryUseCase<L, E, T, R>
where
    L: DeliveryRepository,
    E: EventLogRepository,
    T: TemplateRepository,
    R: TemplateRenderer,
{
    pub async fn execute(&self, delivery_id: Uuid) -> Result<OutboundDelivery, OutboundError> {
        let mut delivery = self
            .deliveries
            .find_by_id(delivery_id)
            .await?
            .ok_or(OutboundError::DeliveryNotFound)?;
        delivery.requeue(Utc::now())?;

        let event = self
            .events
            .find_by_id(delivery.event_id)
            .await?
            .ok_or(OutboundError::EventNotFound)?;
        let content = self.templates.resolve(&event).await?;
        let message = OutboxMessage::delivery_requeued(
            &self.subject_prefix,
            &DeliveryRequest::new(&delivery, &event, &content),
        )?;

        self.deliveries.requeue(&delivery, &message).await?;
        warn!(
            delivery_id = %delivery.id,
            attempt = delivery.attempt_count,
            "delivery re-queued by operator"
        );
        Ok(delivery)
    }
}

pub struct GetPendingDeliveriesUseCase<L: DeliveryRepository> {
    pub deliveries: L,
}

impl<L: DeliveryRepository> GetPendingDeliveriesUseCase<L> {
    pub async fn execute(&self, limit: u64) -> Result<Vec<OutboundDelivery>, OutboundError> {
        self.deliveries.pending(limit).await
    }
}

pub struct GetDueForRetryUseCase<L: DeliveryRepository> {
    pub deliveries: L,
}

impl<L: DeliveryRepository> GetDueForRetryUseCase<L> {
    pub async fn execute(&self, limit: u64) -> Result<Vec<OutboundDelivery>, OutboundError> {
        self.deliveries.due_for_retry(Utc::now(), limit).await
    }
}

pub struct GetEventDeliveriesUseCase<L: DeliveryRepository, E: EventLogRepository> {
    pub deliveries: L,
    pub events: E,
}

impl<L: DeliveryRepository, E: EventLogRepository> GetEventDeliveriesUseCase<L, E> {
    pub async fn execute(&self, event_id: Uuid) -> Result<Vec<OutboundDelivery>, OutboundError> {
        self.events
            .find_by_id(event_id)
            .await?
            .ok_or(OutboundError::EventNotFound)?;
        self.deliveries.by_event(event_id).await
    }
}

pub struct GetContactDeliveriesUseCase<L: DeliveryRepository> {
    pub deliveries: L,
}

impl<L: DeliveryRepository> GetContactDeliveriesUseCase<L> {
    pub async fn execute(
        &self,
        contact_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutboundDelivery>, OutboundError> {
        self.deliveries.by_contact(contact_id, from, to).await
    }
}
