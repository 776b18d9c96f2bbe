use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::OutboundError;
use crate::handlers::deliveries::{DeliveryResponse, delivery_list};
use crate::state::AppState;
use crate::usecase::delivery::GetContactDeliveriesUseCase;

const DEFAULT_LOOKBACK_DAYS: i64 = 30;

#[derive(Deserialize, Default)]
pub struct DeliveryRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ── GET /outbound/contacts/{id}/deliveries ───────────────────────────────────

pub async fn get_contact_deliveries(
    State(state): State<AppState>,
    Path(contact_id): Path<Uuid>,
    Query(query): Query<DeliveryRangeQuery>,
) -> Result<Json<Vec<DeliveryResponse>>, OutboundError> {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_LOOKBACK_DAYS));
    let usecase = GetContactDeliveriesUseCase {
        deliveries: state.delivery_repo(),
    };
    let deliveries = usecase.execute(contact_id, from, to).await?;
    Ok(delivery_list(deliveries))
}
