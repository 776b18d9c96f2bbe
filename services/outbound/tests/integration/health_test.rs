use chrono::{Duration, Utc};

use herald_domain::channel::Channel;

use herald_outbound::domain::delivery::DeliveryState;
use herald_outbound::domain::health::HealthStatus;
use herald_outbound::usecase::health::ChannelHealthUseCase;

use crate::helpers::{MemoryStore, stored_delivery};

/// `delivered` successes and `total - delivered` failures created an hour ago.
fn seed_window(store: &MemoryStore, channel: Channel, total: usize, delivered: usize) {
    let created_at = Utc::now() - Duration::hours(1);
    for i in 0..total {
        let state = if i < delivered {
            DeliveryState::Delivered {
                delivered_at: created_at + Duration::minutes(1),
            }
        } else {
            DeliveryState::Failed {
                failed_at: created_at + Duration::minutes(1),
                error: "smtp 451".to_owned(),
                next_retry_at: None,
            }
        };
        stored_delivery(store, channel, state, 1, created_at);
    }
}

async fn status_of(store: &MemoryStore, channel: Channel) -> HealthStatus {
    ChannelHealthUseCase {
        deliveries: store.clone(),
    }
    .execute(channel)
    .await
    .unwrap()
    .status
}

// ── Success-rate thresholds ──────────────────────────────────────────────────

#[tokio::test]
async fn should_grade_channel_by_success_rate() {
    let cases = [
        (96, HealthStatus::Healthy),
        (80, HealthStatus::Degraded),
        (60, HealthStatus::Unhealthy),
    ];
    for (delivered, expected) in cases {
        let store = MemoryStore::new();
        seed_window(&store, Channel::Email, 100, delivered);
        assert_eq!(
            status_of(&store, Channel::Email).await,
            expected,
            "{delivered}/100 delivered"
        );
    }
}

#[tokio::test]
async fn should_report_error_count_and_last_success() {
    let store = MemoryStore::new();
    seed_window(&store, Channel::Sms, 10, 7);

    let health = ChannelHealthUseCase {
        deliveries: store.clone(),
    }
    .execute(Channel::Sms)
    .await
    .unwrap();

    assert_eq!(health.channel, Channel::Sms);
    assert_eq!(health.error_count_24h, 3);
    assert!(health.last_successful_delivery_at.is_some());
}

// ── Idle channels ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_grade_idle_channel_by_last_success() {
    let cases = [
        (Some(10), HealthStatus::Healthy),
        (Some(50), HealthStatus::Degraded),
        (None, HealthStatus::Unhealthy),
    ];
    for (hours_ago, expected) in cases {
        let store = MemoryStore::new();
        if let Some(hours) = hours_ago {
            // Created before the window so only the success timestamp counts.
            let delivered_at = Utc::now() - Duration::hours(hours);
            stored_delivery(
                &store,
                Channel::Chat,
                DeliveryState::Delivered { delivered_at },
                1,
                delivered_at - Duration::hours(24),
            );
        }
        assert_eq!(
            status_of(&store, Channel::Chat).await,
            expected,
            "last success {hours_ago:?}h ago"
        );
    }
}

#[tokio::test]
async fn should_ignore_other_channels() {
    let store = MemoryStore::new();
    seed_window(&store, Channel::Email, 10, 0);
    seed_window(&store, Channel::InApp, 10, 10);

    assert_eq!(status_of(&store, Channel::InApp).await, HealthStatus::Healthy);
    assert_eq!(status_of(&store, Channel::Email).await, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn should_report_every_channel() {
    let store = MemoryStore::new();
    seed_window(&store, Channel::Email, 20, 20);

    let all = ChannelHealthUseCase {
        deliveries: store.clone(),
    }
    .execute_all()
    .await
    .unwrap();

    assert_eq!(
        all.iter().map(|h| h.channel).collect::<Vec<_>>(),
        Channel::ALL.to_vec()
    );
    assert_eq!(all[0].status, HealthStatus::Healthy);
    assert!(all[1..].iter().all(|h| h.status == HealthStatus::Unhealthy));
}
