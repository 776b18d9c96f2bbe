use sea_orm::entity::prelude::*;

/// Append-only log of every routed event.
/// `processed_at` is set exactly once, in the fan-out transaction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbound_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub service: String,
    pub topic: String,
    pub client_id: Option<String>,
    pub severity: i16,
    /// Raw template reference supplied by the producer; may not parse.
    pub template_id: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub payload: Json,
    pub saga_id: Option<String>,
    pub correlation_id: Option<String>,
    pub is_test: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::outbound_deliveries::Entity")]
    OutboundDeliveries,
}

impl Related<super::outbound_deliveries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OutboundDeliveries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
