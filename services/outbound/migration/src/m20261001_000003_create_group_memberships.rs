use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMemberships::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupMemberships::GroupId).uuid().not_null())
                    .col(ColumnDef::new(GroupMemberships::ContactId).uuid().not_null())
                    .col(
                        ColumnDef::new(GroupMemberships::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(GroupMemberships::AddedBy).string())
                    .foreign_key(
                        ForeignKey::create()
                            .from(GroupMemberships::Table, GroupMemberships::GroupId)
                            .to(RecipientGroups::Table, RecipientGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(GroupMemberships::Table, GroupMemberships::ContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(GroupMemberships::Table)
                    .col(GroupMemberships::GroupId)
                    .col(GroupMemberships::ContactId)
                    .name("uq_group_memberships_group_contact")
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupMemberships::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GroupMemberships {
    Table,
    Id,
    GroupId,
    ContactId,
    AddedAt,
    AddedBy,
}

#[derive(Iden)]
enum RecipientGroups {
    Table,
    Id,
}

#[derive(Iden)]
enum Contacts {
    Table,
    Id,
}
