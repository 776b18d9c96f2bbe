use axum::http::StatusCode;
use axum_test::TestServer;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use herald_outbound::router::build_router;
use herald_outbound::state::AppState;

/// Router over a connection that was never opened; any query fails.
fn server() -> TestServer {
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        subject_prefix: "outbound.delivery".to_owned(),
        shutdown: CancellationToken::new(),
    };
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn should_answer_liveness_with_request_id() {
    let response = server().get("/healthz").await;

    response.assert_status_ok();
    let request_id = response.header("x-request-id");
    assert!(!request_id.is_empty());
}

#[tokio::test]
async fn should_report_not_ready_without_database() {
    let response = server().get("/readyz").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn should_reject_publish_without_content() {
    let response = server()
        .post("/outbound/events")
        .json(&json!({
            "service": "import",
            "topic": "import_failed",
            "severity": "warning",
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["kind"], "MISSING_CONTENT");
}

#[tokio::test]
async fn should_reject_unknown_channel_in_path() {
    let response = server().get("/outbound/channels/pigeon/health").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_map_storage_failure_to_internal_error() {
    let response = server().get("/outbound/channels/email/health").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["kind"], "INTERNAL");
}
