use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TopicTemplateMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TopicTemplateMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TopicTemplateMappings::Service)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TopicTemplateMappings::Topic).string().not_null())
                    .col(ColumnDef::new(TopicTemplateMappings::ClientId).string())
                    .col(
                        ColumnDef::new(TopicTemplateMappings::TemplateId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TopicTemplateMappings::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TopicTemplateMappings::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(TopicTemplateMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                TopicTemplateMappings::Table,
                                TopicTemplateMappings::TemplateId,
                            )
                            .to(MessageTemplates::Table, MessageTemplates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(TopicTemplateMappings::Table)
                    .col(TopicTemplateMappings::Service)
                    .col(TopicTemplateMappings::Topic)
                    .col(TopicTemplateMappings::ClientId)
                    .name("idx_topic_template_mappings_lookup")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TopicTemplateMappings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TopicTemplateMappings {
    Table,
    Id,
    Service,
    Topic,
    ClientId,
    TemplateId,
    Priority,
    IsEnabled,
    CreatedAt,
}

#[derive(Iden)]
enum MessageTemplates {
    Table,
    Id,
}
