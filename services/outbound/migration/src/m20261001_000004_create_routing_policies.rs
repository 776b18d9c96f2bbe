use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RoutingPolicies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoutingPolicies::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoutingPolicies::Service).string().not_null())
                    .col(ColumnDef::new(RoutingPolicies::Topic).string().not_null())
                    .col(ColumnDef::new(RoutingPolicies::ClientId).string())
                    .col(ColumnDef::new(RoutingPolicies::MinSeverity).small_integer())
                    .col(ColumnDef::new(RoutingPolicies::Channel).string().not_null())
                    .col(
                        ColumnDef::new(RoutingPolicies::RecipientGroupId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RoutingPolicies::Role)
                            .string()
                            .not_null()
                            .default("to"),
                    )
                    .col(
                        ColumnDef::new(RoutingPolicies::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RoutingPolicies::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RoutingPolicies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RoutingPolicies::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(RoutingPolicies::CreatedBy).string())
                    .col(ColumnDef::new(RoutingPolicies::UpdatedBy).string())
                    .foreign_key(
                        ForeignKey::create()
                            .from(RoutingPolicies::Table, RoutingPolicies::RecipientGroupId)
                            .to(RecipientGroups::Table, RecipientGroups::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Resolution lookup: enabled policies for (service, topic, client scope).
        manager
            .create_index(
                Index::create()
                    .table(RoutingPolicies::Table)
                    .col(RoutingPolicies::Service)
                    .col(RoutingPolicies::Topic)
                    .col(RoutingPolicies::ClientId)
                    .col(RoutingPolicies::IsEnabled)
                    .name("idx_routing_policies_lookup")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoutingPolicies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RoutingPolicies {
    Table,
    Id,
    Service,
    Topic,
    ClientId,
    MinSeverity,
    Channel,
    RecipientGroupId,
    Role,
    Priority,
    IsEnabled,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
}

#[derive(Iden)]
enum RecipientGroups {
    Table,
    Id,
}
