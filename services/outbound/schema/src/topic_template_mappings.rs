use sea_orm::entity::prelude::*;

/// `(service, topic, client_id?)` → template. Same client-over-default
/// precedence as routing policies; highest `priority` wins within a scope.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "topic_template_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub service: String,
    pub topic: String,
    pub client_id: Option<String>,
    pub template_id: Uuid,
    pub priority: i32,
    pub is_enabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::message_templates::Entity",
        from = "Column::TemplateId",
        to = "super::message_templates::Column::Id"
    )]
    Template,
}

impl Related<super::message_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
