use sea_orm::entity::prelude::*;

/// Named set of contacts. `client_id = NULL` means the group is global.
/// `purpose` is one of `production`, `test_only`, `both`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "recipient_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub purpose: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_memberships::Entity")]
    GroupMemberships,
    #[sea_orm(has_many = "super::routing_policies::Entity")]
    RoutingPolicies,
}

impl Related<super::group_memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupMemberships.def()
    }
}

impl Related<super::routing_policies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoutingPolicies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
