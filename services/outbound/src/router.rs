use axum::{
    Router,
    routing::{get, patch, post},
};

use herald_core::health::healthz;
use herald_core::middleware::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    contacts::get_contact_deliveries,
    deliveries::{begin_attempt, get_due_for_retry, get_pending, requeue_delivery, update_status},
    events::{get_event_deliveries, get_saga_events, publish_event},
    health::{get_channel_health, get_channels_health, readyz},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Events
        .route("/outbound/events", post(publish_event))
        .route("/outbound/events/{id}/deliveries", get(get_event_deliveries))
        .route("/outbound/sagas/{saga_id}/events", get(get_saga_events))
        // Deliveries
        .route("/outbound/deliveries/pending", get(get_pending))
        .route("/outbound/deliveries/due-for-retry", get(get_due_for_retry))
        .route("/outbound/deliveries/{id}/attempts", post(begin_attempt))
        .route("/outbound/deliveries/{id}/status", patch(update_status))
        .route("/outbound/deliveries/{id}/requeue", post(requeue_delivery))
        // Contacts
        .route("/outbound/contacts/{id}/deliveries", get(get_contact_deliveries))
        // Channel health
        .route("/outbound/channels/health", get(get_channels_health))
        .route("/outbound/channels/{channel}/health", get(get_channel_health))
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(request_id_layer())
        .with_state(state)
}
