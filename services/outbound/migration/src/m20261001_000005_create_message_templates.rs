use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageTemplates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageTemplates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MessageTemplates::Name).string().not_null())
                    .col(ColumnDef::new(MessageTemplates::Subject).string().not_null())
                    .col(ColumnDef::new(MessageTemplates::HtmlBody).text().not_null())
                    .col(ColumnDef::new(MessageTemplates::TextBody).text())
                    .col(
                        ColumnDef::new(MessageTemplates::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MessageTemplates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MessageTemplates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageTemplates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MessageTemplates {
    Table,
    Id,
    Name,
    Subject,
    HtmlBody,
    TextBody,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
