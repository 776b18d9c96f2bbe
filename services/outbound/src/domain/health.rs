use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use herald_domain::channel::Channel;

/// Width of the rolling window health is computed over.
pub const HEALTH_WINDOW_HOURS: i64 = 24;

/// How recent a success must be for an idle channel to count as healthy.
pub const IDLE_HEALTHY_HOURS: i64 = 48;

const HEALTHY_SUCCESS_RATE: f64 = 0.95;
const DEGRADED_SUCCESS_RATE: f64 = 0.70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome counts for deliveries created inside the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryWindowCounts {
    pub total: u64,
    pub delivered: u64,
    /// Failed or bounced.
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHealth {
    pub channel: Channel,
    pub status: HealthStatus,
    pub last_successful_delivery_at: Option<DateTime<Utc>>,
    pub error_count_24h: u64,
}

pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(HEALTH_WINDOW_HOURS)
}

/// Health verdict from the window counts and the most recent success ever.
pub fn evaluate(
    counts: DeliveryWindowCounts,
    last_success_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> HealthStatus {
    if counts.total == 0 {
        return match last_success_at {
            Some(at) if now - at <= Duration::hours(IDLE_HEALTHY_HOURS) => HealthStatus::Healthy,
            Some(_) => HealthStatus::Degraded,
            None => HealthStatus::Unhealthy,
        };
    }

    let success_rate = counts.delivered as f64 / counts.total as f64;
    if success_rate > HEALTHY_SUCCESS_RATE {
        HealthStatus::Healthy
    } else if success_rate > DEGRADED_SUCCESS_RATE {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}
