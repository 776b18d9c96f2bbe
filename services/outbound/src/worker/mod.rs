//! Background loops: the outbox relay and the delivery retry sweep.

pub mod relay;
pub mod retry;

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::OutboundError;

/// Run `tick` every `interval` until `cancel` fires. Tick errors are logged
/// and the loop carries on.
pub async fn run_periodically<F, Fut, T>(
    name: &'static str,
    interval: Duration,
    cancel: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OutboundError>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(worker = name, interval_ms = interval.as_millis() as u64, "worker started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(worker = name, "worker stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = tick().await {
                    error!(worker = name, error = %format!("{e:#}"), "worker tick failed");
                }
            }
        }
    }
}
