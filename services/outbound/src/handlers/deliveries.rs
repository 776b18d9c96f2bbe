use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_domain::channel::{Channel, RecipientRole};

use crate::domain::delivery::{DeliveryOutcome, DeliveryStatus, OutboundDelivery};
use crate::error::OutboundError;
use crate::state::AppState;
use crate::usecase::delivery::{
    BeginAttemptUseCase, GetDueForRetryUseCase, GetPendingDeliveriesUseCase,
    RequeueDeliveryUseCase, UpdateStatusInput, UpdateStatusUseCase,
};

const DEFAULT_LIST_LIMIT: u64 = 100;
const MAX_LIST_LIMIT: u64 = 1_000;

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub routing_policy_id: Uuid,
    pub contact_id: Uuid,
    pub channel: Channel,
    pub role: RecipientRole,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub error_message: Option<String>,
    pub external_message_id: Option<String>,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms_opt")]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms_opt")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<OutboundDelivery> for DeliveryResponse {
    fn from(delivery: OutboundDelivery) -> Self {
        Self {
            id: delivery.id,
            event_id: delivery.event_id,
            routing_policy_id: delivery.policy_id,
            contact_id: delivery.contact_id,
            channel: delivery.channel,
            role: delivery.role,
            status: delivery.status(),
            attempt_count: delivery.attempt_count,
            error_message: delivery.state.error().map(str::to_owned),
            external_message_id: delivery.external_message_id,
            next_retry_at: delivery.state.next_retry_at(),
            sent_at: delivery.sent_at,
            created_at: delivery.created_at,
            updated_at: delivery.updated_at,
        }
    }
}

pub fn delivery_list(deliveries: Vec<OutboundDelivery>) -> Json<Vec<DeliveryResponse>> {
    Json(deliveries.into_iter().map(DeliveryResponse::from).collect())
}

#[derive(Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

impl LimitQuery {
    /// Requested limit, defaulted and capped.
    pub fn effective(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
    }
}

// ── POST /outbound/deliveries/{id}/attempts ──────────────────────────────────

pub async fn begin_attempt(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> Result<Json<DeliveryResponse>, OutboundError> {
    let usecase = BeginAttemptUseCase {
        deliveries: state.delivery_repo(),
    };
    let delivery = usecase.execute(delivery_id).await?;
    Ok(Json(delivery.into()))
}

// ── PATCH /outbound/deliveries/{id}/status ───────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    Delivered,
    Failed,
    Bounced,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ReportedStatus,
    pub error: Option<String>,
    pub external_message_id: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryResponse>, OutboundError> {
    let outcome = match body.status {
        ReportedStatus::Delivered => DeliveryOutcome::Delivered,
        ReportedStatus::Failed => DeliveryOutcome::Failed {
            error: body.error.unwrap_or_else(|| "unspecified send failure".to_owned()),
        },
        ReportedStatus::Bounced => DeliveryOutcome::Bounced { error: body.error },
    };
    let usecase = UpdateStatusUseCase {
        deliveries: state.delivery_repo(),
    };
    let delivery = usecase
        .execute(UpdateStatusInput {
            delivery_id,
            outcome,
            external_message_id: body.external_message_id,
        })
        .await?;
    Ok(Json(delivery.into()))
}

// ── POST /outbound/deliveries/{id}/requeue ───────────────────────────────────

pub async fn requeue_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> Result<Json<DeliveryResponse>, OutboundError> {
    let usecase = RequeueDeliveryUseCase {
        deliveries: state.delivery_repo(),
        events: state.event_repo(),
        templates: state.template_resolver(),
        subject_prefix: state.subject_prefix.clone(),
    };
    let delivery = usecase.execute(delivery_id).await?;
    Ok(Json(delivery.into()))
}

// ── GET /outbound/deliveries/pending ─────────────────────────────────────────

pub async fn get_pending(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<DeliveryResponse>>, OutboundError> {
    let usecase = GetPendingDeliveriesUseCase {
        deliveries: state.delivery_repo(),
    };
    let deliveries = usecase
        .execute(query.effective())
        .await?;
    Ok(delivery_list(deliveries))
}

// ── GET /outbound/deliveries/due-for-retry ───────────────────────────────────

pub async fn get_due_for_retry(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<DeliveryResponse>>, OutboundError> {
    let usecase = GetDueForRetryUseCase {
        deliveries: state.delivery_repo(),
    };
    let deliveries = usecase
        .execute(query.effective())
        .await?;
    Ok(delivery_list(deliveries))
}
