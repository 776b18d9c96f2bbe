use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RecipientGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecipientGroups::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecipientGroups::Name).string().not_null())
                    .col(ColumnDef::new(RecipientGroups::Description).string())
                    .col(ColumnDef::new(RecipientGroups::ClientId).string())
                    .col(
                        ColumnDef::new(RecipientGroups::Purpose)
                            .string()
                            .not_null()
                            .default("production"),
                    )
                    .col(
                        ColumnDef::new(RecipientGroups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RecipientGroups::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(RecipientGroups::Table)
                    .col(RecipientGroups::Name)
                    .col(RecipientGroups::ClientId)
                    .name("uq_recipient_groups_name_client_id")
                    .unique()
                    .nulls_not_distinct()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecipientGroups::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RecipientGroups {
    Table,
    Id,
    Name,
    Description,
    ClientId,
    Purpose,
    CreatedAt,
    UpdatedAt,
}
