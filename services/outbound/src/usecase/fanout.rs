use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::delivery::OutboundDelivery;
use crate::domain::repository::{DeliveryRepository, DirectoryRepository};
use crate::domain::types::{
    DeliveryRequest, EmptyPolicy, OutboundEvent, OutboxMessage, ResolvedContent, RoutingPolicy,
};
use crate::error::OutboundError;

#[derive(Debug)]
pub struct FanOutResult {
    pub deliveries: Vec<OutboundDelivery>,
    /// Policies whose group had no eligible recipient.
    pub empty_policies: Vec<EmptyPolicy>,
    /// The event had already been fanned out; `deliveries` are the existing rows.
    pub already_processed: bool,
}

/// Expands resolved policies into one pending delivery per eligible group
/// member and commits them with their outbox messages in one transaction.
pub struct FanOutEngine<D: DirectoryRepository, L: DeliveryRepository> {
    pub directory: D,
    pub deliveries: L,
    pub subject_prefix: String,
}

impl<D: DirectoryRepository, L: DeliveryRepository> FanOutEngine<D, L> {
    pub async fn fan_out(
        &self,
        event: &OutboundEvent,
        policies: &[RoutingPolicy],
        content: &ResolvedContent,
        cancel: &CancellationToken,
    ) -> Result<FanOutResult, OutboundError> {
        if event.is_processed() {
            return self.existing(event).await;
        }

        let now = Utc::now();
        let mut deliveries = Vec::new();
        let mut empty_policies = Vec::new();

        for policy in policies {
            let group = self
                .directory
                .find_group(policy.recipient_group_id)
                .await?
                .ok_or(OutboundError::GroupNotFound)?;
            if !group.purpose.accepts(event.is_test) {
                debug!(
                    event_id = %event.id,
                    policy_id = %policy.id,
                    group_id = %group.id,
                    purpose = %group.purpose,
                    is_test = event.is_test,
                    "group excluded by purpose"
                );
                continue;
            }

            let members = self.directory.active_members(group.id).await?;
            let before = deliveries.len();
            let mut skipped = 0usize;
            for contact in &members {
                if contact.reachable_via(policy.channel) {
                    deliveries.push(OutboundDelivery::pending(event.id, policy, contact.id, now));
                } else {
                    skipped += 1;
                }
            }
            let created = deliveries.len() - before;

            if skipped > 0 {
                debug!(
                    event_id = %event.id,
                    policy_id = %policy.id,
                    channel = %policy.channel,
                    skipped,
                    "members without required contact data skipped"
                );
            }
            if created == 0 {
                warn!(
                    event_id = %event.id,
                    policy_id = %policy.id,
                    group_id = %group.id,
                    channel = %policy.channel,
                    members = members.len(),
                    "policy resolved to zero eligible recipients"
                );
                empty_policies.push(EmptyPolicy {
                    policy_id: policy.id,
                    recipient_group_id: group.id,
                    channel: policy.channel,
                });
            }
        }

        let outbox = deliveries
            .iter()
            .map(|d| {
                OutboxMessage::delivery_requested(
                    &self.subject_prefix,
                    &DeliveryRequest::new(d, event, content),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        if cancel.is_cancelled() {
            return Err(OutboundError::Cancelled);
        }

        let committed = self
            .deliveries
            .commit_fan_out(event.id, &deliveries, &outbox, now)
            .await?;
        if !committed {
            debug!(event_id = %event.id, "event processed concurrently");
            return self.existing(event).await;
        }

        info!(
            event_id = %event.id,
            deliveries = deliveries.len(),
            empty_policies = empty_policies.len(),
            "event fanned out"
        );
        Ok(FanOutResult {
            deliveries,
            empty_policies,
            already_processed: false,
        })
    }

    async fn existing(&self, event: &OutboundEvent) -> Result<FanOutResult, OutboundError> {
        Ok(FanOutResult {
            deliveries: self.deliveries.by_event(event.id).await?,
            empty_policies: vec![],
            already_processed: true,
        })
    }
}
