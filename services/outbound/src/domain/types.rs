use std::fmt;
use std::str::FromStr;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_domain::UnknownVariant;
use herald_domain::channel::{Channel, ContactField, RecipientRole};
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use crate::domain::delivery::OutboundDelivery;
use crate::error::OutboundError;

/// Immutable record of something that happened, as received from a producer.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub id: Uuid,
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub severity: Severity,
    /// Raw template reference; only used when it parses as a UUID.
    pub template_id: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub saga_id: Option<String>,
    pub correlation_id: Option<String>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboundEvent {
    pub fn explicit_template_id(&self) -> Option<Uuid> {
        self.template_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// Rule binding an event key to a channel, recipient group and role.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub id: Uuid,
    pub service: Service,
    pub topic: Topic,
    /// `None` marks a default policy.
    pub client_id: Option<String>,
    pub min_severity: Option<Severity>,
    pub channel: Channel,
    pub recipient_group_id: Uuid,
    pub role: RecipientRole,
    /// Higher wins ties.
    pub priority: i32,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl RoutingPolicy {
    /// Enabled and not filtered out by `min_severity`.
    pub fn applies_to(&self, severity: Severity) -> bool {
        self.is_enabled && severity.meets(self.min_severity)
    }
}

/// Whether a recipient group may receive production and/or test sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPurpose {
    Production,
    TestOnly,
    Both,
}

impl GroupPurpose {
    pub const ALL: [GroupPurpose; 3] = [Self::Production, Self::TestOnly, Self::Both];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::TestOnly => "test_only",
            Self::Both => "both",
        }
    }

    pub fn accepts(self, is_test: bool) -> bool {
        match self {
            Self::Both => true,
            Self::Production => !is_test,
            Self::TestOnly => is_test,
        }
    }
}

impl fmt::Display for GroupPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupPurpose {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "group purpose",
                value: s.to_owned(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct RecipientGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// `None` for global groups.
    pub client_id: Option<String>,
    pub purpose: GroupPurpose,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub is_active: bool,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn has_field(&self, field: ContactField) -> bool {
        match field {
            ContactField::Email => !self.email.trim().is_empty(),
            ContactField::Phone => self
                .phone
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty()),
        }
    }

    /// Whether this contact carries the data `channel` needs.
    pub fn reachable_via(&self, channel: Channel) -> bool {
        channel
            .required_contact_field()
            .is_none_or(|field| self.has_field(field))
    }
}

#[derive(Debug, Clone)]
pub struct GroupMembership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub contact_id: Uuid,
    pub added_at: DateTime<Utc>,
    pub added_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TopicTemplateMapping {
    pub id: Uuid,
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub template_id: Uuid,
    pub priority: i32,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Message content after template resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    /// `None` when the event's own subject/body were used.
    pub template_id: Option<Uuid>,
}

/// A policy whose group produced no eligible recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyPolicy {
    pub policy_id: Uuid,
    pub recipient_group_id: Uuid,
    pub channel: Channel,
}

/// Outbox kind for every delivery hand-off.
pub const DELIVERY_REQUESTED: &str = "delivery.requested";

/// Relay gives up on an outbox row after this many publish attempts.
pub const OUTBOX_MAX_ATTEMPTS: u32 = 10;

/// Cap on the relay's per-row backoff, in seconds.
pub const OUTBOX_MAX_BACKOFF_SECS: i64 = 300;

/// Bus payload consumed by channel senders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub delivery_id: Uuid,
    pub event_id: Uuid,
    pub contact_id: Uuid,
    pub channel: Channel,
    pub role: RecipientRole,
    pub attempt: u32,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub template_id: Option<Uuid>,
    pub correlation_id: Option<String>,
    pub saga_id: Option<String>,
}

impl DeliveryRequest {
    pub fn new(
        delivery: &OutboundDelivery,
        event: &OutboundEvent,
        content: &ResolvedContent,
    ) -> Self {
        Self {
            delivery_id: delivery.id,
            event_id: delivery.event_id,
            contact_id: delivery.contact_id,
            channel: delivery.channel,
            role: delivery.role,
            attempt: delivery.attempt_count,
            subject: content.subject.clone(),
            html_body: content.html_body.clone(),
            text_body: content.text_body.clone(),
            template_id: content.template_id,
            correlation_id: event.correlation_id.clone(),
            saga_id: event.saga_id.clone(),
        }
    }
}

/// Row to be written to the outbox alongside a delivery state change.
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub kind: String,
    pub subject: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

impl OutboxMessage {
    /// Hand-off for a fresh or retried attempt; keyed by attempt number.
    pub fn delivery_requested(
        subject_prefix: &str,
        request: &DeliveryRequest,
    ) -> Result<Self, OutboundError> {
        let key = format!(
            "{DELIVERY_REQUESTED}:{}:{}",
            request.delivery_id, request.attempt
        );
        Self::build(subject_prefix, request, key)
    }

    /// Hand-off for an operator re-queue. `attempt` does not move on re-queue,
    /// so the key is unique per message instead.
    pub fn delivery_requeued(
        subject_prefix: &str,
        request: &DeliveryRequest,
    ) -> Result<Self, OutboundError> {
        let id = Uuid::now_v7();
        let key = format!("{DELIVERY_REQUESTED}:{}:requeue:{id}", request.delivery_id);
        let mut message = Self::build(subject_prefix, request, key)?;
        message.id = id;
        Ok(message)
    }

    fn build(
        subject_prefix: &str,
        request: &DeliveryRequest,
        idempotency_key: String,
    ) -> Result<Self, OutboundError> {
        let payload = serde_json::to_value(request).context("serialize delivery request")?;
        Ok(Self {
            id: Uuid::now_v7(),
            kind: DELIVERY_REQUESTED.to_owned(),
            subject: format!("{subject_prefix}.{}", request.channel),
            payload,
            idempotency_key,
        })
    }
}

/// Outbox row picked up by the relay.
#[derive(Debug, Clone)]
pub struct PendingOutboxMessage {
    pub id: Uuid,
    pub subject: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
}
