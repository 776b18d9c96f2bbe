use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use herald_domain::channel::{Channel, RecipientRole};
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};

use crate::domain::repository::{DirectoryRepository, PolicyRepository};
use crate::domain::scope::{ScopedLookup, resolve_scoped};
use crate::domain::types::RoutingPolicy;
use crate::error::OutboundError;

/// Selects the routing policies that apply to an event.
pub struct PolicyResolver<P: PolicyRepository> {
    pub policies: P,
}

struct PolicyLookup<'a, P> {
    policies: &'a P,
    service: Service,
    topic: Topic,
    severity: Severity,
}

impl<P: PolicyRepository> ScopedLookup for PolicyLookup<'_, P> {
    type Item = RoutingPolicy;

    async fn lookup(&self, client_id: Option<&str>) -> Result<Vec<RoutingPolicy>, OutboundError> {
        let mut found = self
            .policies
            .find_enabled(self.service, self.topic, client_id, self.severity)
            .await?;
        // Storage filters already; keep the contract independent of it.
        found.retain(|p| p.applies_to(self.severity));
        found.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(found)
    }
}

impl<P: PolicyRepository> PolicyResolver<P> {
    /// Client-specific policies fully shadow the defaults. An empty result is
    /// a valid outcome, logged at warn.
    pub async fn resolve(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
        severity: Severity,
    ) -> Result<Vec<RoutingPolicy>, OutboundError> {
        let lookup = PolicyLookup {
            policies: &self.policies,
            service,
            topic,
            severity,
        };
        let resolved = resolve_scoped(&lookup, client_id).await?;
        if resolved.items.is_empty() {
            warn!(
                service = %service,
                topic = %topic,
                client_id = client_id.unwrap_or(""),
                severity = %severity,
                "no routing policy matched"
            );
        } else {
            debug!(
                service = %service,
                topic = %topic,
                scope = ?resolved.scope,
                count = resolved.items.len(),
                "routing policies resolved"
            );
        }
        Ok(resolved.items)
    }
}

pub struct CreatePolicyInput {
    pub service: Service,
    pub topic: Topic,
    pub client_id: Option<String>,
    pub min_severity: Option<Severity>,
    pub channel: Channel,
    pub recipient_group_id: Uuid,
    pub role: RecipientRole,
    pub priority: i32,
    pub created_by: Option<String>,
}

pub struct CreatePolicyUseCase<P: PolicyRepository, D: DirectoryRepository> {
    pub policies: P,
    pub directory: D,
}

impl<P: PolicyRepository, D: DirectoryRepository> CreatePolicyUseCase<P, D> {
    pub async fn execute(&self, input: CreatePolicyInput) -> Result<RoutingPolicy, OutboundError> {
        self.directory
            .find_group(input.recipient_group_id)
            .await?
            .ok_or(OutboundError::GroupNotFound)?;

        let now = Utc::now();
        let policy = RoutingPolicy {
            id: Uuid::now_v7(),
            service: input.service,
            topic: input.topic,
            client_id: input.client_id,
            min_severity: input.min_severity,
            channel: input.channel,
            recipient_group_id: input.recipient_group_id,
            role: input.role,
            priority: input.priority,
            is_enabled: true,
            created_at: now,
            updated_at: now,
            created_by: input.created_by.clone(),
            updated_by: input.created_by,
        };
        self.policies.create(&policy).await?;
        Ok(policy)
    }
}

pub struct SetPolicyEnabledUseCase<P: PolicyRepository> {
    pub policies: P,
}

impl<P: PolicyRepository> SetPolicyEnabledUseCase<P> {
    pub async fn execute(
        &self,
        policy_id: Uuid,
        enabled: bool,
        updated_by: Option<&str>,
    ) -> Result<(), OutboundError> {
        let updated = self
            .policies
            .set_enabled(policy_id, enabled, updated_by, Utc::now())
            .await?;
        if !updated {
            return Err(OutboundError::PolicyNotFound);
        }
        Ok(())
    }
}
