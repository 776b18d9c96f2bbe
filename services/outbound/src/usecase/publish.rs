use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use crate::domain::delivery::OutboundDelivery;
use crate::domain::repository::{
    DeliveryRepository, DirectoryRepository, EventLogRepository, PolicyRepository,
    TemplateRenderer, TemplateRepository,
};
use crate::domain::types::{EmptyPolicy, OutboundEvent, ResolvedContent};
use crate::error::OutboundError;
use crate::usecase::fanout::FanOutEngine;
use crate::usecase::policy::PolicyResolver;
use crate::usecase::template::TemplateResolver;

pub struct PublishEventInput {
    /// Caller-chosen id makes the publish idempotent.
    pub event_id: Option<Uuid>,
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub severity: Severity,
    pub template_id: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub saga_id: Option<String>,
    pub correlation_id: Option<String>,
    pub is_test: bool,
}

#[derive(Debug)]
pub struct PublishOutcome {
    pub event_id: Uuid,
    pub deliveries: Vec<OutboundDelivery>,
    pub empty_policies: Vec<EmptyPolicy>,
    pub already_processed: bool,
}

/// Resolve content → log → resolve policies → fan out.
pub struct PublishEventUseCase<E, P, T, R, D, L>
where
    E: EventLogRepository,
    P: PolicyRepository,
    T: TemplateRepository,
    R: TemplateRenderer,
    D: DirectoryRepository,
    L: DeliveryRepository,
{
    pub events: E,
    pub policies: PolicyResolver<P>,
    pub templates: TemplateResolver<T, R>,
    pub fan_out: FanOutEngine<D, L>,
}

impl<E, P, T, R, D, L> PublishEventUseCase<E, P, T, R, D, L>
where
    E: EventLogRepository,
    P: PolicyRepository,
    T: TemplateRepository,
    R: TemplateRenderer,
    D: DirectoryRepository,
    L: DeliveryRepository,
{
    pub async fn execute(
        &self,
        input: PublishEventInput,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, OutboundError> {
        if input.subject.is_none() && input.body.is_none() && input.template_id.is_none() {
            return Err(OutboundError::MissingContent);
        }
        if cancel.is_cancelled() {
            return Err(OutboundError::Cancelled);
        }

        // A replayed id continues from the stored event, not the new input.
        if let Some(event_id) = input.event_id {
            if let Some(stored) = self.events.find_by_id(event_id).await? {
                return self.resume(stored, cancel).await;
            }
        }

        let candidate = OutboundEvent {
            id: input.event_id.unwrap_or_else(Uuid::now_v7),
            service: input.service,
            topic: input.topic,
            client_id: input.client_id,
            severity: input.severity,
            template_id: input.template_id,
            subject: input.subject,
            body: input.body,
            payload: input.payload,
            saga_id: input.saga_id,
            correlation_id: input.correlation_id,
            is_test: input.is_test,
            created_at: Utc::now(),
            processed_at: None,
        };

        // Content is resolved before the append so a rejected event never
        // reaches the log.
        let content = self.templates.resolve(&candidate).await?;
        if !self.events.append(&candidate).await? {
            let stored = self
                .events
                .find_by_id(candidate.id)
                .await?
                .ok_or(OutboundError::EventNotFound)?;
            return self.resume(stored, cancel).await;
        }
        self.route(&candidate, &content, cancel).await
    }

    async fn resume(
        &self,
        event: OutboundEvent,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, OutboundError> {
        info!(event_id = %event.id, processed = event.is_processed(), "event replayed");
        if event.is_processed() {
            let deliveries = self.fan_out.deliveries.by_event(event.id).await?;
            return Ok(PublishOutcome {
                event_id: event.id,
                deliveries,
                empty_policies: vec![],
                already_processed: true,
            });
        }
        let content = self.templates.resolve(&event).await?;
        self.route(&event, &content, cancel).await
    }

    async fn route(
        &self,
        event: &OutboundEvent,
        content: &ResolvedContent,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, OutboundError> {
        let policies = self
            .policies
            .resolve(
                event.service,
                event.topic,
                event.client_id.as_deref(),
                event.severity,
            )
            .await?;
        let result = self
            .fan_out
            .fan_out(event, &policies, content, cancel)
            .await?;

        Ok(PublishOutcome {
            event_id: event.id,
            deliveries: result.deliveries,
            empty_policies: result.empty_policies,
            already_processed: result.already_processed,
        })
    }
}

/// Events sharing a saga id.
pub struct GetSagaEventsUseCase<E: EventLogRepository> {
    pub events: E,
}

impl<E: EventLogRepository> GetSagaEventsUseCase<E> {
    pub async fn execute(&self, saga_id: &str) -> Result<Vec<OutboundEvent>, OutboundError> {
        self.events.list_by_saga(saga_id).await
    }
}
