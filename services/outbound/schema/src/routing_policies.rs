use sea_orm::entity::prelude::*;

/// Rule binding `(service, topic, client_id?, min_severity?)` to a channel,
/// recipient group and role. `client_id = NULL` is the default policy set.
///
/// `min_severity` is stored as the ordered severity integer
/// (0 = info .. 3 = critical).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "routing_policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub service: String,
    pub topic: String,
    pub client_id: Option<String>,
    pub min_severity: Option<i16>,
    pub channel: String,
    pub recipient_group_id: Uuid,
    pub role: String,
    pub priority: i32,
    pub is_enabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::recipient_groups::Entity",
        from = "Column::RecipientGroupId",
        to = "super::recipient_groups::Column::Id"
    )]
    RecipientGroup,
}

impl Related<super::recipient_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipientGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
