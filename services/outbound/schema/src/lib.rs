//! sea-orm entities for the outbound routing service.

pub mod contacts;
pub mod group_memberships;
pub mod message_templates;
pub mod outbound_deliveries;
pub mod outbound_events;
pub mod outbox_messages;
pub mod recipient_groups;
pub mod routing_policies;
pub mod topic_template_mappings;
