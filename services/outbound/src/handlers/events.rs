use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use crate::domain::types::{EmptyPolicy, OutboundEvent};
use crate::error::OutboundError;
use crate::handlers::deliveries::{DeliveryResponse, delivery_list};
use crate::state::AppState;
use crate::usecase::delivery::GetEventDeliveriesUseCase;
use crate::usecase::publish::{GetSagaEventsUseCase, PublishEventInput};

// ── POST /outbound/events ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PublishEventRequest {
    pub event_id: Option<Uuid>,
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub severity: Severity,
    pub template_id: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub saga_id: Option<String>,
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Serialize)]
pub struct PublishEventResponse {
    pub event_id: Uuid,
    pub already_processed: bool,
    pub deliveries: Vec<DeliveryResponse>,
    pub empty_policies: Vec<EmptyPolicy>,
}

pub async fn publish_event(
    State(state): State<AppState>,
    Json(body): Json<PublishEventRequest>,
) -> Result<(StatusCode, Json<PublishEventResponse>), OutboundError> {
    let usecase = state.publish_usecase();
    let outcome = usecase
        .execute(
            PublishEventInput {
                event_id: body.event_id,
                service: body.service,
                topic: body.topic,
                client_id: body.client_id,
                severity: body.severity,
                template_id: body.template_id,
                subject: body.subject,
                body: body.body,
                payload: body.payload,
                saga_id: body.saga_id,
                correlation_id: body.correlation_id,
                is_test: body.is_test,
            },
            &state.shutdown,
        )
        .await?;

    let status = if outcome.already_processed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(PublishEventResponse {
            event_id: outcome.event_id,
            already_processed: outcome.already_processed,
            deliveries: outcome
                .deliveries
                .into_iter()
                .map(DeliveryResponse::from)
                .collect(),
            empty_policies: outcome.empty_policies,
        }),
    ))
}

// ── GET /outbound/events/{id}/deliveries ─────────────────────────────────────

pub async fn get_event_deliveries(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryResponse>>, OutboundError> {
    let usecase = GetEventDeliveriesUseCase {
        deliveries: state.delivery_repo(),
        events: state.event_repo(),
    };
    let deliveries = usecase.execute(event_id).await?;
    Ok(delivery_list(deliveries))
}

// ── GET /outbound/sagas/{saga_id}/events ─────────────────────────────────────

#[derive(Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub severity: Severity,
    pub subject: Option<String>,
    pub saga_id: Option<String>,
    pub correlation_id: Option<String>,
    pub is_test: bool,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms_opt")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<OutboundEvent> for EventResponse {
    fn from(event: OutboundEvent) -> Self {
        Self {
            id: event.id,
            service: event.service,
            topic: event.topic,
            client_id: event.client_id,
            severity: event.severity,
            subject: event.subject,
            saga_id: event.saga_id,
            correlation_id: event.correlation_id,
            is_test: event.is_test,
            created_at: event.created_at,
            processed_at: event.processed_at,
        }
    }
}

pub async fn get_saga_events(
    State(state): State<AppState>,
    Path(saga_id): Path<String>,
) -> Result<Json<Vec<EventResponse>>, OutboundError> {
    let usecase = GetSagaEventsUseCase {
        events: state.event_repo(),
    };
    let events = usecase.execute(&saga_id).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}
