use chrono::Utc;

use herald_domain::channel::Channel;

use crate::domain::health::{ChannelHealth, evaluate, window_start};
use crate::domain::repository::DeliveryRepository;
use crate::error::OutboundError;

/// Channel health, recomputed from delivery history on every call.
pub struct ChannelHealthUseCase<L: DeliveryRepository> {
    pub deliveries: L,
}

impl<L: DeliveryRepository> ChannelHealthUseCase<L> {
    pub async fn execute(&self, channel: Channel) -> Result<ChannelHealth, OutboundError> {
        let now = Utc::now();
        let counts = self
            .deliveries
            .window_counts(channel, window_start(now))
            .await?;
        let last_success_at = self.deliveries.last_delivered_at(channel).await?;
        Ok(ChannelHealth {
            channel,
            status: evaluate(counts, last_success_at, now),
            last_successful_delivery_at: last_success_at,
            error_count_24h: counts.errors,
        })
    }

    pub async fn execute_all(&self) -> Result<Vec<ChannelHealth>, OutboundError> {
        let mut all = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            all.push(self.execute(channel).await?);
        }
        Ok(all)
    }
}
