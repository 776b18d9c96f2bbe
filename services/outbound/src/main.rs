use sea_orm::Database;
use tokio_util::sync::CancellationToken;
use tracing::info;

use herald_core::config::Config;
use herald_core::tracing::init_tracing;

use herald_outbound::config::OutboundConfig;
use herald_outbound::infra::bus::NatsPublisher;
use herald_outbound::router::build_router;
use herald_outbound::state::AppState;
use herald_outbound::worker::relay::OutboxRelay;
use herald_outbound::worker::retry::RetrySweep;
use herald_outbound::worker::run_periodically;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = OutboundConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let nats = async_nats::connect(&config.nats_url)
        .await
        .expect("failed to connect to NATS");

    let shutdown = CancellationToken::new();
    let state = AppState {
        db,
        subject_prefix: config.subject_prefix.clone(),
        shutdown: shutdown.clone(),
    };

    // Outbox relay
    let relay = OutboxRelay {
        outbox: state.outbox_repo(),
        publisher: NatsPublisher::new(nats),
        batch_size: config.relay_batch_size,
    };
    let relay_interval = config.relay_interval();
    let relay_cancel = shutdown.clone();
    let relay_handle = tokio::spawn(async move {
        run_periodically("outbox_relay", relay_interval, relay_cancel, || {
            relay.run_once()
        })
        .await;
    });

    // Retry sweep
    let sweep = RetrySweep {
        deliveries: state.delivery_repo(),
        events: state.event_repo(),
        templates: state.template_resolver(),
        subject_prefix: config.subject_prefix.clone(),
        batch_size: config.retry_batch_size,
    };
    let retry_interval = config.retry_interval();
    let retry_cancel = shutdown.clone();
    let retry_handle = tokio::spawn(async move {
        run_periodically("retry_sweep", retry_interval, retry_cancel, || {
            sweep.run_once()
        })
        .await;
    });

    // HTTP server
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.outbound_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("outbound service listening on {addr}");
    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .expect("server error");

    shutdown.cancel();
    let _ = tokio::join!(relay_handle, retry_handle);
    info!("outbound service stopped");
}
