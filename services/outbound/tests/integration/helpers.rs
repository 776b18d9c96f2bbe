use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use herald_domain::channel::{Channel, RecipientRole};
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use herald_outbound::domain::delivery::{DeliveryStatus, OutboundDelivery};
use herald_outbound::domain::health::DeliveryWindowCounts;
use herald_outbound::domain::repository::{
    DeliveryRepository, DirectoryRepository, EventLogRepository, MessagePublisher,
    OutboxRepository, PolicyRepository, TemplateRepository,
};
use herald_outbound::domain::types::{
    Contact, GroupMembership, GroupPurpose, MessageTemplate, OutboundEvent, OutboxMessage,
    PendingOutboxMessage, RecipientGroup, RoutingPolicy, TopicTemplateMapping,
};
use herald_outbound::error::OutboundError;
use herald_outbound::infra::renderer::RegexRenderer;
use herald_outbound::usecase::fanout::FanOutEngine;
use herald_outbound::usecase::policy::PolicyResolver;
use herald_outbound::usecase::publish::{PublishEventInput, PublishEventUseCase};
use herald_outbound::usecase::template::TemplateResolver;

pub const SUBJECT_PREFIX: &str = "outbound.delivery";

// ── MemoryStore ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoredOutbox {
    pub message: OutboxMessage,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct StoreInner {
    pub events: Vec<OutboundEvent>,
    pub policies: Vec<RoutingPolicy>,
    pub groups: Vec<RecipientGroup>,
    pub contacts: Vec<Contact>,
    pub memberships: Vec<GroupMembership>,
    pub templates: Vec<MessageTemplate>,
    pub mappings: Vec<TopicTemplateMapping>,
    pub deliveries: Vec<OutboundDelivery>,
    pub outbox: Vec<StoredOutbox>,
}

/// In-memory implementation of every storage port. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap()
    }

    pub fn deliveries(&self) -> Vec<OutboundDelivery> {
        self.lock().deliveries.clone()
    }

    pub fn delivery(&self, id: Uuid) -> OutboundDelivery {
        self.lock()
            .deliveries
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .unwrap()
    }

    pub fn outbox(&self) -> Vec<StoredOutbox> {
        self.lock().outbox.clone()
    }

    pub fn event(&self, id: Uuid) -> OutboundEvent {
        self.lock()
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .unwrap()
    }

    /// Overwrite a stored delivery, e.g. to move its retry time into the past.
    pub fn put_delivery(&self, delivery: OutboundDelivery) {
        let mut inner = self.lock();
        if let Some(slot) = inner.deliveries.iter_mut().find(|d| d.id == delivery.id) {
            *slot = delivery;
        } else {
            inner.deliveries.push(delivery);
        }
    }

    fn push_outbox(inner: &mut StoreInner, messages: &[OutboxMessage]) {
        let now = Utc::now();
        for message in messages {
            if inner
                .outbox
                .iter()
                .any(|o| o.message.idempotency_key == message.idempotency_key)
            {
                continue;
            }
            inner.outbox.push(StoredOutbox {
                message: message.clone(),
                attempts: 0,
                next_attempt_at: now,
                processed_at: None,
                failed_at: None,
            });
        }
    }
}

impl EventLogRepository for MemoryStore {
    async fn append(&self, event: &OutboundEvent) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        if inner.events.iter().any(|e| e.id == event.id) {
            return Ok(false);
        }
        inner.events.push(event.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundEvent>, OutboundError> {
        Ok(self.lock().events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_by_saga(&self, saga_id: &str) -> Result<Vec<OutboundEvent>, OutboundError> {
        let mut events: Vec<_> = self
            .lock()
            .events
            .iter()
            .filter(|e| e.saga_id.as_deref() == Some(saga_id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }
}

impl PolicyRepository for MemoryStore {
    async fn find_enabled(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
        severity: Severity,
    ) -> Result<Vec<RoutingPolicy>, OutboundError> {
        let mut policies: Vec<_> = self
            .lock()
            .policies
            .iter()
            .filter(|p| {
                p.is_enabled
                    && p.service == service
                    && p.topic == topic
                    && p.client_id.as_deref() == client_id
                    && severity.meets(p.min_severity)
            })
            .cloned()
            .collect();
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(policies)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RoutingPolicy>, OutboundError> {
        Ok(self.lock().policies.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, policy: &RoutingPolicy) -> Result<(), OutboundError> {
        self.lock().policies.push(policy.clone());
        Ok(())
    }

    async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
        updated_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        let Some(policy) = inner.policies.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        policy.is_enabled = enabled;
        policy.updated_by = updated_by.map(str::to_owned);
        policy.updated_at = now;
        Ok(true)
    }
}

impl DirectoryRepository for MemoryStore {
    async fn find_group(&self, id: Uuid) -> Result<Option<RecipientGroup>, OutboundError> {
        Ok(self.lock().groups.iter().find(|g| g.id == id).cloned())
    }

    async fn active_members(&self, group_id: Uuid) -> Result<Vec<Contact>, OutboundError> {
        let inner = self.lock();
        Ok(inner
            .memberships
            .iter()
            .filter(|m| m.group_id == group_id)
            .filter_map(|m| inner.contacts.iter().find(|c| c.id == m.contact_id))
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, OutboundError> {
        Ok(self.lock().contacts.iter().find(|c| c.id == id).cloned())
    }

    async fn create_contact(&self, contact: &Contact) -> Result<(), OutboundError> {
        self.lock().contacts.push(contact.clone());
        Ok(())
    }

    async fn deactivate_contact(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        let Some(contact) = inner.contacts.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        contact.is_active = false;
        contact.deactivated_at = Some(now);
        contact.updated_at = now;
        Ok(true)
    }

    async fn create_group(&self, group: &RecipientGroup) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        let taken = inner
            .groups
            .iter()
            .any(|g| g.name == group.name && g.client_id == group.client_id);
        if taken {
            return Ok(false);
        }
        inner.groups.push(group.clone());
        Ok(true)
    }

    async fn add_member(&self, membership: &GroupMembership) -> Result<(), OutboundError> {
        let mut inner = self.lock();
        let exists = inner
            .memberships
            .iter()
            .any(|m| m.group_id == membership.group_id && m.contact_id == membership.contact_id);
        if !exists {
            inner.memberships.push(membership.clone());
        }
        Ok(())
    }

    async fn remove_member(
        &self,
        group_id: Uuid,
        contact_id: Uuid,
    ) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        let before = inner.memberships.len();
        inner
            .memberships
            .retain(|m| !(m.group_id == group_id && m.contact_id == contact_id));
        Ok(inner.memberships.len() < before)
    }
}

impl TemplateRepository for MemoryStore {
    async fn find_template(&self, id: Uuid) -> Result<Option<MessageTemplate>, OutboundError> {
        Ok(self.lock().templates.iter().find(|t| t.id == id).cloned())
    }

    async fn find_mappings(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
    ) -> Result<Vec<TopicTemplateMapping>, OutboundError> {
        let mut mappings: Vec<_> = self
            .lock()
            .mappings
            .iter()
            .filter(|m| {
                m.is_enabled
                    && m.service == service
                    && m.topic == topic
                    && m.client_id.as_deref() == client_id
            })
            .cloned()
            .collect();
        mappings.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(mappings)
    }

    async fn create_template(&self, template: &MessageTemplate) -> Result<(), OutboundError> {
        self.lock().templates.push(template.clone());
        Ok(())
    }

    async fn create_mapping(&self, mapping: &TopicTemplateMapping) -> Result<(), OutboundError> {
        self.lock().mappings.push(mapping.clone());
        Ok(())
    }
}

impl DeliveryRepository for MemoryStore {
    async fn commit_fan_out(
        &self,
        event_id: Uuid,
        deliveries: &[OutboundDelivery],
        outbox: &[OutboxMessage],
        processed_at: DateTime<Utc>,
    ) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        let Some(event) = inner.events.iter_mut().find(|e| e.id == event_id) else {
            return Ok(false);
        };
        if event.processed_at.is_some() {
            return Ok(false);
        }
        event.processed_at = Some(processed_at);
        inner.deliveries.extend_from_slice(deliveries);
        Self::push_outbox(&mut inner, outbox);
        Ok(true)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundDelivery>, OutboundError> {
        Ok(self.lock().deliveries.iter().find(|d| d.id == id).cloned())
    }

    async fn save_state(&self, delivery: &OutboundDelivery) -> Result<(), OutboundError> {
        let mut inner = self.lock();
        let slot = inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery.id)
            .ok_or(OutboundError::DeliveryNotFound)?;
        *slot = delivery.clone();
        Ok(())
    }

    async fn claim_retry(
        &self,
        delivery: &OutboundDelivery,
        seen_attempt: u32,
        message: &OutboxMessage,
    ) -> Result<bool, OutboundError> {
        let mut inner = self.lock();
        let Some(slot) = inner.deliveries.iter_mut().find(|d| {
            d.id == delivery.id
                && d.status() == DeliveryStatus::Failed
                && d.attempt_count == seen_attempt
        }) else {
            return Ok(false);
        };
        *slot = delivery.clone();
        Self::push_outbox(&mut inner, std::slice::from_ref(message));
        Ok(true)
    }

    async fn requeue(
        &self,
        delivery: &OutboundDelivery,
        message: &OutboxMessage,
    ) -> Result<(), OutboundError> {
        let mut inner = self.lock();
        let slot = inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery.id && d.status() == DeliveryStatus::Failed)
            .ok_or(OutboundError::DeliveryNotRetriable)?;
        *slot = delivery.clone();
        Self::push_outbox(&mut inner, std::slice::from_ref(message));
        Ok(())
    }

    async fn pending(&self, limit: u64) -> Result<Vec<OutboundDelivery>, OutboundError> {
        Ok(self
            .lock()
            .deliveries
            .iter()
            .filter(|d| d.status() == DeliveryStatus::Pending)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OutboundDelivery>, OutboundError> {
        Ok(self
            .lock()
            .deliveries
            .iter()
            .filter(|d| d.is_due_for_retry(now))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn by_event(&self, event_id: Uuid) -> Result<Vec<OutboundDelivery>, OutboundError> {
        Ok(self
            .lock()
            .deliveries
            .iter()
            .filter(|d| d.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn by_contact(
        &self,
        contact_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutboundDelivery>, OutboundError> {
        let mut found: Vec<_> = self
            .lock()
            .deliveries
            .iter()
            .filter(|d| d.contact_id == contact_id && d.created_at >= from && d.created_at < to)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn window_counts(
        &self,
        channel: Channel,
        since: DateTime<Utc>,
    ) -> Result<DeliveryWindowCounts, OutboundError> {
        let inner = self.lock();
        let mut counts = DeliveryWindowCounts::default();
        for d in inner
            .deliveries
            .iter()
            .filter(|d| d.channel == channel && d.created_at >= since)
        {
            counts.total += 1;
            match d.status() {
                DeliveryStatus::Delivered => counts.delivered += 1,
                DeliveryStatus::Failed | DeliveryStatus::Bounced => counts.errors += 1,
                DeliveryStatus::Pending | DeliveryStatus::Processing => {}
            }
        }
        Ok(counts)
    }

    async fn last_delivered_at(
        &self,
        channel: Channel,
    ) -> Result<Option<DateTime<Utc>>, OutboundError> {
        use herald_outbound::domain::delivery::DeliveryState;
        Ok(self
            .lock()
            .deliveries
            .iter()
            .filter(|d| d.channel == channel)
            .filter_map(|d| match d.state {
                DeliveryState::Delivered { delivered_at } => Some(delivered_at),
                _ => None,
            })
            .max())
    }
}

impl OutboxRepository for MemoryStore {
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<PendingOutboxMessage>, OutboundError> {
        Ok(self
            .lock()
            .outbox
            .iter()
            .filter(|o| o.processed_at.is_none() && o.failed_at.is_none() && o.next_attempt_at <= now)
            .take(limit as usize)
            .map(|o| PendingOutboxMessage {
                id: o.message.id,
                subject: o.message.subject.clone(),
                payload: o.message.payload.clone(),
                attempts: o.attempts,
            })
            .collect())
    }

    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), OutboundError> {
        if let Some(row) = self.lock().outbox.iter_mut().find(|o| o.message.id == id) {
            row.processed_at = Some(now);
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        attempts: u32,
        _error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), OutboundError> {
        if let Some(row) = self.lock().outbox.iter_mut().find(|o| o.message.id == id) {
            row.attempts = attempts;
            match next_attempt_at {
                Some(at) => row.next_attempt_at = at,
                None => row.failed_at = Some(now),
            }
        }
        Ok(())
    }
}

// ── CapturingPublisher ───────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CapturingPublisher {
    pub sent: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl MessagePublisher for CapturingPublisher {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), OutboundError> {
        let value = serde_json::from_slice(&payload).unwrap();
        self.sent.lock().unwrap().push((subject.to_owned(), value));
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn contact(store: &MemoryStore, name: &str, email: &str, phone: Option<&str>) -> Contact {
    let now = Utc::now();
    let contact = Contact {
        id: Uuid::now_v7(),
        name: name.to_owned(),
        email: email.to_owned(),
        phone: phone.map(str::to_owned),
        organization: None,
        is_active: true,
        user_id: None,
        created_at: now,
        updated_at: now,
        deactivated_at: None,
    };
    store.lock().contacts.push(contact.clone());
    contact
}

pub fn group(
    store: &MemoryStore,
    client_id: Option<&str>,
    purpose: GroupPurpose,
    members: &[&Contact],
) -> RecipientGroup {
    let now = Utc::now();
    let group = RecipientGroup {
        id: Uuid::now_v7(),
        name: format!("group-{}", purpose.as_str()),
        description: None,
        client_id: client_id.map(str::to_owned),
        purpose,
        created_at: now,
        updated_at: now,
    };
    let mut inner = store.lock();
    inner.groups.push(group.clone());
    for member in members {
        inner.memberships.push(GroupMembership {
            id: Uuid::now_v7(),
            group_id: group.id,
            contact_id: member.id,
            added_at: now,
            added_by: None,
        });
    }
    group
}

pub fn policy(
    service: Service,
    topic: Topic,
    client_id: Option<&str>,
    channel: Channel,
    group: &RecipientGroup,
) -> RoutingPolicy {
    let now = Utc::now();
    RoutingPolicy {
        id: Uuid::now_v7(),
        service,
        topic,
        client_id: client_id.map(str::to_owned),
        min_severity: None,
        channel,
        recipient_group_id: group.id,
        role: RecipientRole::To,
        priority: 0,
        is_enabled: true,
        created_at: now,
        updated_at: now,
        created_by: None,
        updated_by: None,
    }
}

pub fn insert_policy(store: &MemoryStore, policy: RoutingPolicy) -> RoutingPolicy {
    store.lock().policies.push(policy.clone());
    policy
}

pub fn template(
    store: &MemoryStore,
    subject: &str,
    html_body: &str,
    text_body: Option<&str>,
    is_active: bool,
) -> MessageTemplate {
    let now = Utc::now();
    let template = MessageTemplate {
        id: Uuid::now_v7(),
        name: "test-template".to_owned(),
        subject: subject.to_owned(),
        html_body: html_body.to_owned(),
        text_body: text_body.map(str::to_owned),
        is_active,
        created_at: now,
        updated_at: now,
    };
    store.lock().templates.push(template.clone());
    template
}

pub fn mapping(
    store: &MemoryStore,
    service: Service,
    topic: Topic,
    client_id: Option<&str>,
    template: &MessageTemplate,
) -> TopicTemplateMapping {
    let mapping = TopicTemplateMapping {
        id: Uuid::now_v7(),
        service,
        topic,
        client_id: client_id.map(str::to_owned),
        template_id: template.id,
        priority: 0,
        is_enabled: true,
        created_at: Utc::now(),
    };
    store.lock().mappings.push(mapping.clone());
    mapping
}

pub fn input(service: Service, topic: Topic, severity: Severity) -> PublishEventInput {
    PublishEventInput {
        event_id: None,
        service,
        topic,
        client_id: None,
        severity,
        template_id: None,
        subject: Some("Import failed".to_owned()),
        body: Some("The nightly import failed.".to_owned()),
        payload: serde_json::Map::new(),
        saga_id: None,
        correlation_id: None,
        is_test: false,
    }
}

pub fn resolver(store: &MemoryStore) -> TemplateResolver<MemoryStore, RegexRenderer> {
    TemplateResolver {
        templates: store.clone(),
        renderer: RegexRenderer,
    }
}

pub type MemoryPublishUseCase = PublishEventUseCase<
    MemoryStore,
    MemoryStore,
    MemoryStore,
    RegexRenderer,
    MemoryStore,
    MemoryStore,
>;

pub fn publish_usecase(store: &MemoryStore) -> MemoryPublishUseCase {
    PublishEventUseCase {
        events: store.clone(),
        policies: PolicyResolver {
            policies: store.clone(),
        },
        templates: resolver(store),
        fan_out: FanOutEngine {
            directory: store.clone(),
            deliveries: store.clone(),
            subject_prefix: SUBJECT_PREFIX.to_owned(),
        },
    }
}

/// Distinct idempotency keys across the outbox.
pub fn outbox_keys(store: &MemoryStore) -> BTreeSet<String> {
    store
        .outbox()
        .into_iter()
        .map(|o| o.message.idempotency_key)
        .collect()
}

pub fn event(service: Service, topic: Topic, client_id: Option<&str>) -> OutboundEvent {
    OutboundEvent {
        id: Uuid::now_v7(),
        service,
        topic,
        client_id: client_id.map(str::to_owned),
        severity: Severity::Warning,
        template_id: None,
        subject: Some("Import failed".to_owned()),
        body: Some("The nightly import failed.".to_owned()),
        payload: serde_json::Map::new(),
        saga_id: None,
        correlation_id: None,
        is_test: false,
        created_at: Utc::now(),
        processed_at: None,
    }
}

/// A stored delivery on `channel` in the given state, bypassing fan-out.
pub fn stored_delivery(
    store: &MemoryStore,
    channel: Channel,
    state: herald_outbound::domain::delivery::DeliveryState,
    attempt_count: u32,
    created_at: DateTime<Utc>,
) -> OutboundDelivery {
    let delivery = OutboundDelivery {
        id: Uuid::now_v7(),
        event_id: Uuid::now_v7(),
        policy_id: Uuid::now_v7(),
        contact_id: Uuid::now_v7(),
        channel,
        role: RecipientRole::To,
        attempt_count,
        state,
        sent_at: None,
        external_message_id: None,
        created_at,
        updated_at: created_at,
    };
    store.put_delivery(delivery.clone());
    delivery
}

/// Pull a failed delivery's retry time into the past.
pub fn make_retry_due(store: &MemoryStore, delivery_id: Uuid) {
    use herald_outbound::domain::delivery::DeliveryState;
    let mut delivery = store.delivery(delivery_id);
    if let DeliveryState::Failed { next_retry_at, .. } = &mut delivery.state {
        if next_retry_at.is_some() {
            *next_retry_at = Some(Utc::now() - chrono::Duration::seconds(1));
        }
    }
    store.put_delivery(delivery);
}
