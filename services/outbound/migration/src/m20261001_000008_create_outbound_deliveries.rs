use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboundDeliveries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboundDeliveries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OutboundDeliveries::EventId).uuid().not_null())
                    .col(
                        ColumnDef::new(OutboundDeliveries::RoutingPolicyId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboundDeliveries::ContactId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboundDeliveries::Channel).string().not_null())
                    .col(ColumnDef::new(OutboundDeliveries::Role).string().not_null())
                    .col(
                        ColumnDef::new(OutboundDeliveries::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(OutboundDeliveries::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OutboundDeliveries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(OutboundDeliveries::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OutboundDeliveries::SentAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(OutboundDeliveries::DeliveredAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(OutboundDeliveries::FailedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OutboundDeliveries::ErrorMessage).text())
                    .col(
                        ColumnDef::new(OutboundDeliveries::NextRetryAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(OutboundDeliveries::ExternalMessageId).string())
                    .col(
                        ColumnDef::new(OutboundDeliveries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(OutboundDeliveries::Table, OutboundDeliveries::EventId)
                            .to(OutboundEvents::Table, OutboundEvents::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Retry sweep: failed rows ordered by next_retry_at.
        manager
            .create_index(
                Index::create()
                    .table(OutboundDeliveries::Table)
                    .col(OutboundDeliveries::Status)
                    .col(OutboundDeliveries::NextRetryAt)
                    .name("idx_outbound_deliveries_status_next_retry_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(OutboundDeliveries::Table)
                    .col(OutboundDeliveries::EventId)
                    .name("idx_outbound_deliveries_event_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(OutboundDeliveries::Table)
                    .col(OutboundDeliveries::ContactId)
                    .col(OutboundDeliveries::CreatedAt)
                    .name("idx_outbound_deliveries_contact_created_at")
                    .to_owned(),
            )
            .await?;

        // Channel health window.
        manager
            .create_index(
                Index::create()
                    .table(OutboundDeliveries::Table)
                    .col(OutboundDeliveries::Channel)
                    .col(OutboundDeliveries::CreatedAt)
                    .name("idx_outbound_deliveries_channel_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboundDeliveries::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OutboundDeliveries {
    Table,
    Id,
    EventId,
    RoutingPolicyId,
    ContactId,
    Channel,
    Role,
    Status,
    AttemptCount,
    CreatedAt,
    StartedAt,
    SentAt,
    DeliveredAt,
    FailedAt,
    ErrorMessage,
    NextRetryAt,
    ExternalMessageId,
    UpdatedAt,
}

#[derive(Iden)]
enum OutboundEvents {
    Table,
    Id,
}
