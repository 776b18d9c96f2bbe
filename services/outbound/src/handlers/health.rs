use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use herald_core::health::readiness;
use herald_domain::channel::Channel;

use crate::domain::health::{ChannelHealth, HealthStatus};
use crate::error::OutboundError;
use crate::state::AppState;
use crate::usecase::health::ChannelHealthUseCase;

/// `GET /readyz`: ready once the database answers a ping.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    readiness(state.db.ping().await.is_ok())
}

#[derive(Serialize)]
pub struct ChannelHealthResponse {
    pub channel: Channel,
    pub status: HealthStatus,
    #[serde(serialize_with = "herald_core::serde::to_rfc3339_ms_opt")]
    pub last_successful_delivery_at: Option<DateTime<Utc>>,
    pub error_count_24h: u64,
}

impl From<ChannelHealth> for ChannelHealthResponse {
    fn from(health: ChannelHealth) -> Self {
        Self {
            channel: health.channel,
            status: health.status,
            last_successful_delivery_at: health.last_successful_delivery_at,
            error_count_24h: health.error_count_24h,
        }
    }
}

// ── GET /outbound/channels/health ────────────────────────────────────────────

pub async fn get_channels_health(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChannelHealthResponse>>, OutboundError> {
    let usecase = ChannelHealthUseCase {
        deliveries: state.delivery_repo(),
    };
    let snapshots = usecase.execute_all().await?;
    Ok(Json(
        snapshots
            .into_iter()
            .map(ChannelHealthResponse::from)
            .collect(),
    ))
}

// ── GET /outbound/channels/{channel}/health ──────────────────────────────────

pub async fn get_channel_health(
    State(state): State<AppState>,
    Path(channel): Path<Channel>,
) -> Result<Json<ChannelHealthResponse>, OutboundError> {
    let usecase = ChannelHealthUseCase {
        deliveries: state.delivery_repo(),
    };
    let snapshot = usecase.execute(channel).await?;
    Ok(Json(snapshot.into()))
}
