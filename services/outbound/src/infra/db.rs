use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    UpdateMany,
};
use uuid::Uuid;

use herald_domain::channel::Channel;
use herald_domain::severity::Severity;
use herald_domain::source::{Service, Topic};
use herald_outbound_schema::{
    contacts, group_memberships, message_templates, outbound_deliveries, outbound_events,
    outbox_messages, recipient_groups, routing_policies, topic_template_mappings,
};

use crate::domain::delivery::{
    DeliveryState, DeliveryStatus, MAX_DELIVERY_ATTEMPTS, OutboundDelivery,
};
use crate::domain::health::DeliveryWindowCounts;
use crate::domain::repository::{
    DeliveryRepository, DirectoryRepository, EventLogRepository, OutboxRepository,
    PolicyRepository, TemplateRepository,
};
use crate::domain::types::{
    Contact, GroupMembership, MessageTemplate, OutboundEvent, OutboxMessage,
    PendingOutboxMessage, RecipientGroup, RoutingPolicy, TopicTemplateMapping,
};
use crate::error::OutboundError;

fn client_scope<C: ColumnTrait>(column: C, client_id: Option<&str>) -> Condition {
    match client_id {
        Some(id) => Condition::all().add(column.eq(id)),
        None => Condition::all().add(column.is_null()),
    }
}

// ── Event log ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEventLogRepository {
    pub db: DatabaseConnection,
}

impl EventLogRepository for DbEventLogRepository {
    async fn append(&self, event: &OutboundEvent) -> Result<bool, OutboundError> {
        let rows = outbound_events::Entity::insert(outbound_events::ActiveModel {
            id: Set(event.id),
            service: Set(event.service.as_str().to_owned()),
            topic: Set(event.topic.as_str().to_owned()),
            client_id: Set(event.client_id.clone()),
            severity: Set(event.severity.as_i16()),
            template_id: Set(event.template_id.clone()),
            subject: Set(event.subject.clone()),
            body: Set(event.body.clone()),
            payload: Set(serde_json::Value::Object(event.payload.clone())),
            saga_id: Set(event.saga_id.clone()),
            correlation_id: Set(event.correlation_id.clone()),
            is_test: Set(event.is_test),
            created_at: Set(event.created_at),
            processed_at: Set(event.processed_at),
        })
        .on_conflict(
            OnConflict::column(outbound_events::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("append outbound event")?;
        Ok(rows > 0)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundEvent>, OutboundError> {
        let model = outbound_events::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find outbound event")?;
        model.map(event_from_model).transpose()
    }

    async fn list_by_saga(&self, saga_id: &str) -> Result<Vec<OutboundEvent>, OutboundError> {
        let models = outbound_events::Entity::find()
            .filter(outbound_events::Column::SagaId.eq(saga_id))
            .order_by_asc(outbound_events::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list outbound events by saga")?;
        models.into_iter().map(event_from_model).collect()
    }
}

fn event_from_model(model: outbound_events::Model) -> Result<OutboundEvent, OutboundError> {
    let payload = match model.payload {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Ok(OutboundEvent {
        id: model.id,
        service: model.service.parse().context("decode event service")?,
        topic: model.topic.parse().context("decode event topic")?,
        client_id: model.client_id,
        severity: severity_from_i16(model.severity)?,
        template_id: model.template_id,
        subject: model.subject,
        body: model.body,
        payload,
        saga_id: model.saga_id,
        correlation_id: model.correlation_id,
        is_test: model.is_test,
        created_at: model.created_at,
        processed_at: model.processed_at,
    })
}

fn severity_from_i16(value: i16) -> Result<Severity, OutboundError> {
    Ok(Severity::from_i16(value).ok_or_else(|| anyhow!("unknown severity {value}"))?)
}

// ── Routing policies ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPolicyRepository {
    pub db: DatabaseConnection,
}

impl PolicyRepository for DbPolicyRepository {
    async fn find_enabled(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
        severity: Severity,
    ) -> Result<Vec<RoutingPolicy>, OutboundError> {
        let models = routing_policies::Entity::find()
            .filter(routing_policies::Column::Service.eq(service.as_str()))
            .filter(routing_policies::Column::Topic.eq(topic.as_str()))
            .filter(client_scope(routing_policies::Column::ClientId, client_id))
            .filter(routing_policies::Column::IsEnabled.eq(true))
            .filter(
                Condition::any()
                    .add(routing_policies::Column::MinSeverity.is_null())
                    .add(routing_policies::Column::MinSeverity.lte(severity.as_i16())),
            )
            .order_by_desc(routing_policies::Column::Priority)
            .all(&self.db)
            .await
            .context("find enabled routing policies")?;
        models.into_iter().map(policy_from_model).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RoutingPolicy>, OutboundError> {
        let model = routing_policies::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find routing policy")?;
        model.map(policy_from_model).transpose()
    }

    async fn create(&self, policy: &RoutingPolicy) -> Result<(), OutboundError> {
        routing_policies::Entity::insert(routing_policies::ActiveModel {
            id: Set(policy.id),
            service: Set(policy.service.as_str().to_owned()),
            topic: Set(policy.topic.as_str().to_owned()),
            client_id: Set(policy.client_id.clone()),
            min_severity: Set(policy.min_severity.map(Severity::as_i16)),
            channel: Set(policy.channel.as_str().to_owned()),
            recipient_group_id: Set(policy.recipient_group_id),
            role: Set(policy.role.as_str().to_owned()),
            priority: Set(policy.priority),
            is_enabled: Set(policy.is_enabled),
            created_at: Set(policy.created_at),
            updated_at: Set(policy.updated_at),
            created_by: Set(policy.created_by.clone()),
            updated_by: Set(policy.updated_by.clone()),
        })
        .exec_without_returning(&self.db)
        .await
        .context("create routing policy")?;
        Ok(())
    }

    async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
        updated_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, OutboundError> {
        let result = routing_policies::Entity::update_many()
            .col_expr(routing_policies::Column::IsEnabled, Expr::value(enabled))
            .col_expr(
                routing_policies::Column::UpdatedBy,
                Expr::value(updated_by.map(str::to_owned)),
            )
            .col_expr(routing_policies::Column::UpdatedAt, Expr::value(now))
            .filter(routing_policies::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("set routing policy enabled")?;
        Ok(result.rows_affected > 0)
    }
}

fn policy_from_model(model: routing_policies::Model) -> Result<RoutingPolicy, OutboundError> {
    Ok(RoutingPolicy {
        id: model.id,
        service: model.service.parse().context("decode policy service")?,
        topic: model.topic.parse().context("decode policy topic")?,
        client_id: model.client_id,
        min_severity: model.min_severity.map(severity_from_i16).transpose()?,
        channel: model.channel.parse().context("decode policy channel")?,
        recipient_group_id: model.recipient_group_id,
        role: model.role.parse().context("decode policy role")?,
        priority: model.priority,
        is_enabled: model.is_enabled,
        created_at: model.created_at,
        updated_at: model.updated_at,
        created_by: model.created_by,
        updated_by: model.updated_by,
    })
}

// ── Directory ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbDirectoryRepository {
    pub db: DatabaseConnection,
}

impl DirectoryRepository for DbDirectoryRepository {
    async fn find_group(&self, id: Uuid) -> Result<Option<RecipientGroup>, OutboundError> {
        let model = recipient_groups::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find recipient group")?;
        model.map(group_from_model).transpose()
    }

    async fn active_members(&self, group_id: Uuid) -> Result<Vec<Contact>, OutboundError> {
        let models = contacts::Entity::find()
            .inner_join(group_memberships::Entity)
            .filter(group_memberships::Column::GroupId.eq(group_id))
            .filter(contacts::Column::IsActive.eq(true))
            .order_by_asc(contacts::Column::Name)
            .all(&self.db)
            .await
            .context("list active group members")?;
        Ok(models.into_iter().map(contact_from_model).collect())
    }

    async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, OutboundError> {
        let model = contacts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find contact")?;
        Ok(model.map(contact_from_model))
    }

    async fn create_contact(&self, contact: &Contact) -> Result<(), OutboundError> {
        contacts::Entity::insert(contacts::ActiveModel {
            id: Set(contact.id),
            name: Set(contact.name.clone()),
            email: Set(contact.email.clone()),
            phone: Set(contact.phone.clone()),
            organization: Set(contact.organization.clone()),
            is_active: Set(contact.is_active),
            user_id: Set(contact.user_id),
            created_at: Set(contact.created_at),
            updated_at: Set(contact.updated_at),
            deactivated_at: Set(contact.deactivated_at),
        })
        .exec_without_returning(&self.db)
        .await
        .context("create contact")?;
        Ok(())
    }

    async fn deactivate_contact(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, OutboundError> {
        let result = contacts::Entity::update_many()
            .col_expr(contacts::Column::IsActive, Expr::value(false))
            .col_expr(contacts::Column::DeactivatedAt, Expr::value(now))
            .col_expr(contacts::Column::UpdatedAt, Expr::value(now))
            .filter(contacts::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("deactivate contact")?;
        Ok(result.rows_affected > 0)
    }

    async fn create_group(&self, group: &RecipientGroup) -> Result<bool, OutboundError> {
        let rows = recipient_groups::Entity::insert(recipient_groups::ActiveModel {
            id: Set(group.id),
            name: Set(group.name.clone()),
            description: Set(group.description.clone()),
            client_id: Set(group.client_id.clone()),
            purpose: Set(group.purpose.as_str().to_owned()),
            created_at: Set(group.created_at),
            updated_at: Set(group.updated_at),
        })
        .on_conflict(
            OnConflict::columns([
                recipient_groups::Column::Name,
                recipient_groups::Column::ClientId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("create recipient group")?;
        Ok(rows > 0)
    }

    async fn add_member(&self, membership: &GroupMembership) -> Result<(), OutboundError> {
        group_memberships::Entity::insert(group_memberships::ActiveModel {
            id: Set(membership.id),
            group_id: Set(membership.group_id),
            contact_id: Set(membership.contact_id),
            added_at: Set(membership.added_at),
            added_by: Set(membership.added_by.clone()),
        })
        .on_conflict(
            OnConflict::columns([
                group_memberships::Column::GroupId,
                group_memberships::Column::ContactId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("add group member")?;
        Ok(())
    }

    async fn remove_member(
        &self,
        group_id: Uuid,
        contact_id: Uuid,
    ) -> Result<bool, OutboundError> {
        let result = group_memberships::Entity::delete_many()
            .filter(group_memberships::Column::GroupId.eq(group_id))
            .filter(group_memberships::Column::ContactId.eq(contact_id))
            .exec(&self.db)
            .await
            .context("remove group member")?;
        Ok(result.rows_affected > 0)
    }
}

fn group_from_model(model: recipient_groups::Model) -> Result<RecipientGroup, OutboundError> {
    Ok(RecipientGroup {
        id: model.id,
        name: model.name,
        description: model.description,
        client_id: model.client_id,
        purpose: model.purpose.parse().context("decode group purpose")?,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn contact_from_model(model: contacts::Model) -> Contact {
    Contact {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        organization: model.organization,
        is_active: model.is_active,
        user_id: model.user_id,
        created_at: model.created_at,
        updated_at: model.updated_at,
        deactivated_at: model.deactivated_at,
    }
}

// ── Templates ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbTemplateRepository {
    pub db: DatabaseConnection,
}

impl TemplateRepository for DbTemplateRepository {
    async fn find_template(&self, id: Uuid) -> Result<Option<MessageTemplate>, OutboundError> {
        let model = message_templates::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find message template")?;
        Ok(model.map(template_from_model))
    }

    async fn find_mappings(
        &self,
        service: Service,
        topic: Topic,
        client_id: Option<&str>,
    ) -> Result<Vec<TopicTemplateMapping>, OutboundError> {
        let models = topic_template_mappings::Entity::find()
            .filter(topic_template_mappings::Column::Service.eq(service.as_str()))
            .filter(topic_template_mappings::Column::Topic.eq(topic.as_str()))
            .filter(client_scope(
                topic_template_mappings::Column::ClientId,
                client_id,
            ))
            .filter(topic_template_mappings::Column::IsEnabled.eq(true))
            .order_by_desc(topic_template_mappings::Column::Priority)
            .all(&self.db)
            .await
            .context("find template mappings")?;
        models.into_iter().map(mapping_from_model).collect()
    }

    async fn create_template(&self, template: &MessageTemplate) -> Result<(), OutboundError> {
        message_templates::Entity::insert(message_templates::ActiveModel {
            id: Set(template.id),
            name: Set(template.name.clone()),
            subject: Set(template.subject.clone()),
            html_body: Set(template.html_body.clone()),
            text_body: Set(template.text_body.clone()),
            is_active: Set(template.is_active),
            created_at: Set(template.created_at),
            updated_at: Set(template.updated_at),
        })
        .exec_without_returning(&self.db)
        .await
        .context("create message template")?;
        Ok(())
    }

    async fn create_mapping(&self, mapping: &TopicTemplateMapping) -> Result<(), OutboundError> {
        topic_template_mappings::Entity::insert(topic_template_mappings::ActiveModel {
            id: Set(mapping.id),
            service: Set(mapping.service.as_str().to_owned()),
            topic: Set(mapping.topic.as_str().to_owned()),
            client_id: Set(mapping.client_id.clone()),
            template_id: Set(mapping.template_id),
            priority: Set(mapping.priority),
            is_enabled: Set(mapping.is_enabled),
            created_at: Set(mapping.created_at),
        })
        .exec_without_returning(&self.db)
        .await
        .context("create template mapping")?;
        Ok(())
    }
}

fn template_from_model(model: message_templates::Model) -> MessageTemplate {
    MessageTemplate {
        id: model.id,
        name: model.name,
        subject: model.subject,
        html_body: model.html_body,
        text_body: model.text_body,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn mapping_from_model(
    model: topic_template_mappings::Model,
) -> Result<TopicTemplateMapping, OutboundError> {
    Ok(TopicTemplateMapping {
        id: model.id,
        service: model.service.parse().context("decode mapping service")?,
        topic: model.topic.parse().context("decode mapping topic")?,
        client_id: model.client_id,
        template_id: model.template_id,
        priority: model.priority,
        is_enabled: model.is_enabled,
        created_at: model.created_at,
    })
}

// ── Deliveries ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbDeliveryRepository {
    pub db: DatabaseConnection,
}

impl DeliveryRepository for DbDeliveryRepository {
    async fn commit_fan_out(
        &self,
        event_id: Uuid,
        deliveries: &[OutboundDelivery],
        outbox: &[OutboxMessage],
        processed_at: DateTime<Utc>,
    ) -> Result<bool, OutboundError> {
        let deliveries = deliveries.to_vec();
        let outbox = outbox.to_vec();
        let committed = self
            .db
            .transaction::<_, bool, DbErr>(|txn| {
                Box::pin(async move {
                    // One-shot: only the first fan-out sees processed_at = NULL.
                    let claimed = outbound_events::Entity::update_many()
                        .col_expr(
                            outbound_events::Column::ProcessedAt,
                            Expr::value(processed_at),
                        )
                        .filter(outbound_events::Column::Id.eq(event_id))
                        .filter(outbound_events::Column::ProcessedAt.is_null())
                        .exec(txn)
                        .await?;
                    if claimed.rows_affected == 0 {
                        return Ok(false);
                    }
                    if !deliveries.is_empty() {
                        outbound_deliveries::Entity::insert_many(
                            deliveries.iter().map(delivery_active_model),
                        )
                        .exec_without_returning(txn)
                        .await?;
                    }
                    insert_outbox_messages(txn, &outbox).await?;
                    Ok(true)
                })
            })
            .await
            .context("commit fan-out")?;
        Ok(committed)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundDelivery>, OutboundError> {
        let model = outbound_deliveries::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find delivery")?;
        model.map(delivery_from_model).transpose()
    }

    async fn save_state(&self, delivery: &OutboundDelivery) -> Result<(), OutboundError> {
        let result = with_state(outbound_deliveries::Entity::update_many(), delivery)
            .filter(outbound_deliveries::Column::Id.eq(delivery.id))
            .exec(&self.db)
            .await
            .context("save delivery state")?;
        if result.rows_affected == 0 {
            return Err(OutboundError::DeliveryNotFound);
        }
        Ok(())
    }

    async fn claim_retry(
        &self,
        delivery: &OutboundDelivery,
        seen_attempt: u32,
        message: &OutboxMessage,
    ) -> Result<bool, OutboundError> {
        let delivery = delivery.clone();
        let message = message.clone();
        let claimed = self
            .db
            .transaction::<_, bool, DbErr>(|txn| {
                Box::pin(async move {
                    let result = with_state(outbound_deliveries::Entity::update_many(), &delivery)
                        .filter(outbound_deliveries::Column::Id.eq(delivery.id))
                        .filter(
                            outbound_deliveries::Column::Status
                                .eq(DeliveryStatus::Failed.as_str()),
                        )
                        .filter(outbound_deliveries::Column::AttemptCount.eq(seen_attempt as i32))
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Ok(false);
                    }
                    insert_outbox_messages(txn, std::slice::from_ref(&message)).await?;
                    Ok(true)
                })
            })
            .await
            .context("claim delivery retry")?;
        Ok(claimed)
    }

    async fn requeue(
        &self,
        delivery: &OutboundDelivery,
        message: &OutboxMessage,
    ) -> Result<(), OutboundError> {
        let delivery = delivery.clone();
        let message = message.clone();
        let requeued = self
            .db
            .transaction::<_, bool, DbErr>(|txn| {
                Box::pin(async move {
                    let result = with_state(outbound_deliveries::Entity::update_many(), &delivery)
                        .filter(outbound_deliveries::Column::Id.eq(delivery.id))
                        .filter(
                            outbound_deliveries::Column::Status
                                .eq(DeliveryStatus::Failed.as_str()),
                        )
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Ok(false);
                    }
                    insert_outbox_messages(txn, std::slice::from_ref(&message)).await?;
                    Ok(true)
                })
            })
            .await
            .context("requeue delivery")?;
        if !requeued {
            return Err(OutboundError::DeliveryNotRetriable);
        }
        Ok(())
    }

    async fn pending(&self, limit: u64) -> Result<Vec<OutboundDelivery>, OutboundError> {
        let models = outbound_deliveries::Entity::find()
            .filter(outbound_deliveries::Column::Status.eq(DeliveryStatus::Pending.as_str()))
            .order_by_asc(outbound_deliveries::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list pending deliveries")?;
        models.into_iter().map(delivery_from_model).collect()
    }

    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OutboundDelivery>, OutboundError> {
        let models = outbound_deliveries::Entity::find()
            .filter(outbound_deliveries::Column::Status.eq(DeliveryStatus::Failed.as_str()))
            .filter(outbound_deliveries::Column::NextRetryAt.lte(now))
            .filter(outbound_deliveries::Column::AttemptCount.lt(MAX_DELIVERY_ATTEMPTS as i32))
            .order_by_asc(outbound_deliveries::Column::NextRetryAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list deliveries due for retry")?;
        models.into_iter().map(delivery_from_model).collect()
    }

    async fn by_event(&self, event_id: Uuid) -> Result<Vec<OutboundDelivery>, OutboundError> {
        let models = outbound_deliveries::Entity::find()
            .filter(outbound_deliveries::Column::EventId.eq(event_id))
            .order_by_asc(outbound_deliveries::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list deliveries by event")?;
        models.into_iter().map(delivery_from_model).collect()
    }

    async fn by_contact(
        &self,
        contact_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutboundDelivery>, OutboundError> {
        let models = outbound_deliveries::Entity::find()
            .filter(outbound_deliveries::Column::ContactId.eq(contact_id))
            .filter(outbound_deliveries::Column::CreatedAt.gte(from))
            .filter(outbound_deliveries::Column::CreatedAt.lt(to))
            .order_by_desc(outbound_deliveries::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list deliveries by contact")?;
        models.into_iter().map(delivery_from_model).collect()
    }

    async fn window_counts(
        &self,
        channel: Channel,
        since: DateTime<Utc>,
    ) -> Result<DeliveryWindowCounts, OutboundError> {
        let in_window = || {
            outbound_deliveries::Entity::find()
                .filter(outbound_deliveries::Column::Channel.eq(channel.as_str()))
                .filter(outbound_deliveries::Column::CreatedAt.gte(since))
        };
        let total = in_window()
            .count(&self.db)
            .await
            .context("count deliveries in window")?;
        let delivered = in_window()
            .filter(outbound_deliveries::Column::Status.eq(DeliveryStatus::Delivered.as_str()))
            .count(&self.db)
            .await
            .context("count delivered in window")?;
        let errors = in_window()
            .filter(outbound_deliveries::Column::Status.is_in([
                DeliveryStatus::Failed.as_str(),
                DeliveryStatus::Bounced.as_str(),
            ]))
            .count(&self.db)
            .await
            .context("count errors in window")?;
        Ok(DeliveryWindowCounts {
            total,
            delivered,
            errors,
        })
    }

    async fn last_delivered_at(
        &self,
        channel: Channel,
    ) -> Result<Option<DateTime<Utc>>, OutboundError> {
        let model = outbound_deliveries::Entity::find()
            .filter(outbound_deliveries::Column::Channel.eq(channel.as_str()))
            .filter(outbound_deliveries::Column::DeliveredAt.is_not_null())
            .order_by_desc(outbound_deliveries::Column::DeliveredAt)
            .one(&self.db)
            .await
            .context("find last delivered")?;
        Ok(model.and_then(|m| m.delivered_at))
    }
}

/// Column projection of a [`DeliveryState`]. A bounce reuses the failure columns.
struct StateColumns {
    status: DeliveryStatus,
    started_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    next_retry_at: Option<DateTime<Utc>>,
}

impl StateColumns {
    fn from_state(state: &DeliveryState) -> Self {
        let mut cols = Self {
            status: state.status(),
            started_at: None,
            delivered_at: None,
            failed_at: None,
            error_message: None,
            next_retry_at: None,
        };
        match state {
            DeliveryState::Pending => {}
            DeliveryState::Processing { started_at } => cols.started_at = Some(*started_at),
            DeliveryState::Delivered { delivered_at } => cols.delivered_at = Some(*delivered_at),
            DeliveryState::Failed {
                failed_at,
                error,
                next_retry_at,
            } => {
                cols.failed_at = Some(*failed_at);
                cols.error_message = Some(error.clone());
                cols.next_retry_at = *next_retry_at;
            }
            DeliveryState::Bounced { bounced_at, error } => {
                cols.failed_at = Some(*bounced_at);
                cols.error_message = error.clone();
            }
        }
        cols
    }
}

fn with_state(
    update: UpdateMany<outbound_deliveries::Entity>,
    delivery: &OutboundDelivery,
) -> UpdateMany<outbound_deliveries::Entity> {
    let cols = StateColumns::from_state(&delivery.state);
    update
        .col_expr(
            outbound_deliveries::Column::Status,
            Expr::value(cols.status.as_str()),
        )
        .col_expr(
            outbound_deliveries::Column::AttemptCount,
            Expr::value(delivery.attempt_count as i32),
        )
        .col_expr(outbound_deliveries::Column::StartedAt, Expr::value(cols.started_at))
        .col_expr(outbound_deliveries::Column::SentAt, Expr::value(delivery.sent_at))
        .col_expr(
            outbound_deliveries::Column::DeliveredAt,
            Expr::value(cols.delivered_at),
        )
        .col_expr(outbound_deliveries::Column::FailedAt, Expr::value(cols.failed_at))
        .col_expr(
            outbound_deliveries::Column::ErrorMessage,
            Expr::value(cols.error_message),
        )
        .col_expr(
            outbound_deliveries::Column::NextRetryAt,
            Expr::value(cols.next_retry_at),
        )
        .col_expr(
            outbound_deliveries::Column::ExternalMessageId,
            Expr::value(delivery.external_message_id.clone()),
        )
        .col_expr(
            outbound_deliveries::Column::UpdatedAt,
            Expr::value(delivery.updated_at),
        )
}

fn delivery_active_model(delivery: &OutboundDelivery) -> outbound_deliveries::ActiveModel {
    let cols = StateColumns::from_state(&delivery.state);
    outbound_deliveries::ActiveModel {
        id: Set(delivery.id),
        event_id: Set(delivery.event_id),
        routing_policy_id: Set(delivery.policy_id),
        contact_id: Set(delivery.contact_id),
        channel: Set(delivery.channel.as_str().to_owned()),
        role: Set(delivery.role.as_str().to_owned()),
        status: Set(cols.status.as_str().to_owned()),
        attempt_count: Set(delivery.attempt_count as i32),
        created_at: Set(delivery.created_at),
        started_at: Set(cols.started_at),
        sent_at: Set(delivery.sent_at),
        delivered_at: Set(cols.delivered_at),
        failed_at: Set(cols.failed_at),
        error_message: Set(cols.error_message),
        next_retry_at: Set(cols.next_retry_at),
        external_message_id: Set(delivery.external_message_id.clone()),
        updated_at: Set(delivery.updated_at),
    }
}

fn delivery_from_model(model: outbound_deliveries::Model) -> Result<OutboundDelivery, OutboundError> {
    let status: DeliveryStatus = model.status.parse().context("decode delivery status")?;
    let fallback_at = model.updated_at;
    let state = match status {
        DeliveryStatus::Pending => DeliveryState::Pending,
        DeliveryStatus::Processing => DeliveryState::Processing {
            started_at: model.started_at.unwrap_or(fallback_at),
        },
        DeliveryStatus::Delivered => DeliveryState::Delivered {
            delivered_at: model.delivered_at.unwrap_or(fallback_at),
        },
        DeliveryStatus::Failed => DeliveryState::Failed {
            failed_at: model.failed_at.unwrap_or(fallback_at),
            error: model.error_message.unwrap_or_default(),
            next_retry_at: model.next_retry_at,
        },
        DeliveryStatus::Bounced => DeliveryState::Bounced {
            bounced_at: model.failed_at.unwrap_or(fallback_at),
            error: model.error_message,
        },
    };
    Ok(OutboundDelivery {
        id: model.id,
        event_id: model.event_id,
        policy_id: model.routing_policy_id,
        contact_id: model.contact_id,
        channel: model.channel.parse().context("decode delivery channel")?,
        role: model.role.parse().context("decode delivery role")?,
        attempt_count: u32::try_from(model.attempt_count).context("decode attempt count")?,
        state,
        sent_at: model.sent_at,
        external_message_id: model.external_message_id,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Outbox ────────────────────────────────────────────────────────────────────

async fn insert_outbox_messages(
    txn: &DatabaseTransaction,
    messages: &[OutboxMessage],
) -> Result<(), DbErr> {
    if messages.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let models = messages.iter().map(|m| outbox_messages::ActiveModel {
        id: Set(m.id),
        kind: Set(m.kind.clone()),
        subject: Set(m.subject.clone()),
        payload: Set(m.payload.clone()),
        idempotency_key: Set(m.idempotency_key.clone()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        next_attempt_at: Set(now),
        processed_at: Set(None),
        failed_at: Set(None),
    });
    outbox_messages::Entity::insert_many(models)
        .on_conflict(
            OnConflict::column(outbox_messages::Column::IdempotencyKey)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct DbOutboxRepository {
    pub db: DatabaseConnection,
}

impl OutboxRepository for DbOutboxRepository {
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<PendingOutboxMessage>, OutboundError> {
        let models = outbox_messages::Entity::find()
            .filter(outbox_messages::Column::ProcessedAt.is_null())
            .filter(outbox_messages::Column::FailedAt.is_null())
            .filter(outbox_messages::Column::NextAttemptAt.lte(now))
            .order_by_asc(outbox_messages::Column::NextAttemptAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("fetch due outbox messages")?;
        Ok(models
            .into_iter()
            .map(|m| PendingOutboxMessage {
                id: m.id,
                subject: m.subject,
                payload: m.payload,
                attempts: u32::try_from(m.attempts).unwrap_or(0),
            })
            .collect())
    }

    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), OutboundError> {
        outbox_messages::Entity::update_many()
            .col_expr(outbox_messages::Column::ProcessedAt, Expr::value(now))
            .filter(outbox_messages::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("mark outbox message published")?;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        attempts: u32,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), OutboundError> {
        let update = outbox_messages::Entity::update_many()
            .col_expr(outbox_messages::Column::Attempts, Expr::value(attempts as i32))
            .col_expr(outbox_messages::Column::LastError, Expr::value(error.to_owned()));
        let update = match next_attempt_at {
            Some(at) => update.col_expr(outbox_messages::Column::NextAttemptAt, Expr::value(at)),
            None => update.col_expr(outbox_messages::Column::FailedAt, Expr::value(now)),
        };
        update
            .filter(outbox_messages::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("record outbox publish failure")?;
        Ok(())
    }
}
