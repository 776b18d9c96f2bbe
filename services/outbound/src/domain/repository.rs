#![allow(async_fn_in_trait)]

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use herald_domain::channel::Channel;
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use crate::domain::delivery::OutboundDelivery;
use crate::domain::health::DeliveryWindowCounts;
use crate::domain::types::{
    Contact, GroupMembership, MessageTemplate, OutboundEvent, OutboxMessage,
    PendingOutboxMessage, RecipientGroup, RoutingPolicy, TopicTemplateMapping,
};
use crate::error::OutboundError;

/// Append-only log of routed events.
pub trait EventLogRepository: Send + Sync {
    /// Insert the event. Returns `false` if an event with the same id exists.
    async fn append(&self, event: &OutboundEvent) -> Result<bool, OutboundError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundEvent>, OutboundError>;

    /// Events sharing a saga id, oldest first.
    async fn list_by_saga(&self, saga_id: &str) -> Result<Vec<OutboundEvent>, OutboundError>;
}

/// Routing policy store.
pub trait PolicyRepository: Send + Sync {
    /// Enabled policies for exactly this scope (`client_id = None` → defaults only)
    /// whose `min_severity` is unset or ≤ `severity`, priority descending.
    async fn find_enabled(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
        severity: Severity,
    ) -> Result<Vec<RoutingPolicy>, OutboundError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RoutingPolicy>, OutboundError>;

    async fn create(&self, policy: &RoutingPolicy) -> Result<(), OutboundError>;

    /// Returns `false` if the policy does not exist.
    async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
        updated_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, OutboundError>;
}

/// Contacts, recipient groups and memberships.
pub trait DirectoryRepository: Send + Sync {
    async fn find_group(&self, id: Uuid) -> Result<Option<RecipientGroup>, OutboundError>;

    /// Active contacts that are members of the group.
    async fn active_members(&self, group_id: Uuid) -> Result<Vec<Contact>, OutboundError>;

    async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, OutboundError>;

    async fn create_contact(&self, contact: &Contact) -> Result<(), OutboundError>;

    /// Soft-deactivate. Returns `false` if the contact does not exist.
    async fn deactivate_contact(&self, id: Uuid, now: DateTime<Utc>)
    -> Result<bool, OutboundError>;

    /// Returns `false` if the scope already has a group with this name.
    async fn create_group(&self, group: &RecipientGroup) -> Result<bool, OutboundError>;

    /// Adding an existing member is a no-op.
    async fn add_member(&self, membership: &GroupMembership) -> Result<(), OutboundError>;

    /// Returns `false` if there was no such membership.
    async fn remove_member(&self, group_id: Uuid, contact_id: Uuid)
    -> Result<bool, OutboundError>;
}

/// Message templates and topic → template mappings.
pub trait TemplateRepository: Send + Sync {
    async fn find_template(&self, id: Uuid) -> Result<Option<MessageTemplate>, OutboundError>;

    /// Enabled mappings for exactly this scope, priority descending.
    async fn find_mappings(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
    ) -> Result<Vec<TopicTemplateMapping>, OutboundError>;

    async fn create_template(&self, template: &MessageTemplate) -> Result<(), OutboundError>;

    async fn create_mapping(&self, mapping: &TopicTemplateMapping) -> Result<(), OutboundError>;
}

/// Delivery rows plus the outbox writes that must share their transaction.
pub trait DeliveryRepository: Send + Sync {
    /// In one transaction: set the event's `processed_at` if still null, insert
    /// the deliveries and the outbox messages. Returns `false` and writes
    /// nothing if the event was already processed.
    async fn commit_fan_out(
        &self,
        event_id: Uuid,
        deliveries: &[OutboundDelivery],
        outbox: &[OutboxMessage],
        processed_at: DateTime<Utc>,
    ) -> Result<bool, OutboundError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundDelivery>, OutboundError>;

    /// Persist the delivery's current state. `DeliveryNotFound` if missing.
    async fn save_state(&self, delivery: &OutboundDelivery) -> Result<(), OutboundError>;

    /// Persist a retry claim only if the row is still `failed` with
    /// `attempt_count = seen_attempt`, together with its outbox message.
    /// Returns `false` when another worker got there first.
    async fn claim_retry(
        &self,
        delivery: &OutboundDelivery,
        seen_attempt: u32,
        message: &OutboxMessage,
    ) -> Result<bool, OutboundError>;

    /// Persist a re-queue and its outbox message atomically.
    async fn requeue(
        &self,
        delivery: &OutboundDelivery,
        message: &OutboxMessage,
    ) -> Result<(), OutboundError>;

    /// Pending deliveries, oldest first.
    async fn pending(&self, limit: u64) -> Result<Vec<OutboundDelivery>, OutboundError>;

    /// `status = failed AND next_retry_at <= now AND attempt_count < 3`,
    /// earliest retry first.
    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OutboundDelivery>, OutboundError>;

    async fn by_event(&self, event_id: Uuid) -> Result<Vec<OutboundDelivery>, OutboundError>;

    /// Deliveries for a contact created in `[from, to)`, newest first.
    async fn by_contact(
        &self,
        contact_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutboundDelivery>, OutboundError>;

    /// Outcome counts for deliveries on `channel` created at or after `since`.
    async fn window_counts(
        &self,
        channel: Channel,
        since: DateTime<Utc>,
    ) -> Result<DeliveryWindowCounts, OutboundError>;

    async fn last_delivered_at(
        &self,
        channel: Channel,
    ) -> Result<Option<DateTime<Utc>>, OutboundError>;
}

/// Relay side of the transactional outbox.
pub trait OutboxRepository: Send + Sync {
    /// Unprocessed, unfailed rows with `next_attempt_at <= now`, oldest first.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<PendingOutboxMessage>, OutboundError>;

    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), OutboundError>;

    /// Record a failed publish. `next_attempt_at = None` gives up on the row.
    async fn record_failure(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), OutboundError>;
}

/// Template text rendering. Markup syntax is the implementation's concern.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, data: &serde_json::Map<String, serde_json::Value>) -> String;

    fn extract_variables(&self, template: &str) -> BTreeSet<String>;
}

/// Publishes relayed outbox messages to the bus.
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), OutboundError>;
}
