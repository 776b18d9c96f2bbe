use sea_orm::entity::prelude::*;

/// One delivery attempt record per (event, policy, contact). Never deleted.
///
/// `status` is one of `pending`, `processing`, `delivered`, `failed`,
/// `bounced`; the nullable timestamp columns are only meaningful for the
/// statuses that set them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "outbound_deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event_id: Uuid,
    pub routing_policy_id: Uuid,
    pub contact_id: Uuid,
    pub channel: String,
    pub role: String,
    pub status: String,
    pub attempt_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub failed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<chrono::DateTime<chrono::Utc>>,
    pub external_message_id: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::outbound_events::Entity",
        from = "Column::EventId",
        to = "super::outbound_events::Column::Id"
    )]
    Event,
}

impl Related<super::outbound_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
