use sea_orm_migration::prelude::*;

mod m20261001_000001_create_contacts;
mod m20261001_000002_create_recipient_groups;
mod m20261001_000003_create_group_memberships;
mod m20261001_000004_create_routing_policies;
mod m20261001_000005_create_message_templates;
mod m20261001_000006_create_topic_template_mappings;
mod m20261001_000007_create_outbound_events;
mod m20261001_000008_create_outbound_deliveries;
mod m20261001_000009_create_outbox_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_contacts::Migration),
            Box::new(m20261001_000002_create_recipient_groups::Migration),
            Box::new(m20261001_000003_create_group_memberships::Migration),
            Box::new(m20261001_000004_create_routing_policies::Migration),
            Box::new(m20261001_000005_create_message_templates::Migration),
            Box::new(m20261001_000006_create_topic_template_mappings::Migration),
            Box::new(m20261001_000007_create_outbound_events::Migration),
            Box::new(m20261001_000008_create_outbound_deliveries::Migration),
            Box::new(m20261001_000009_create_outbox_messages::Migration),
        ]
    }
}
