use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboundEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboundEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OutboundEvents::Service).string().not_null())
                    .col(ColumnDef::new(OutboundEvents::Topic).string().not_null())
                    .col(ColumnDef::new(OutboundEvents::ClientId).string())
                    .col(
                        ColumnDef::new(OutboundEvents::Severity)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboundEvents::TemplateId).string())
                    .col(ColumnDef::new(OutboundEvents::Subject).string())
                    .col(ColumnDef::new(OutboundEvents::Body).text())
                    .col(
                        ColumnDef::new(OutboundEvents::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboundEvents::SagaId).string())
                    .col(ColumnDef::new(OutboundEvents::CorrelationId).string())
                    .col(
                        ColumnDef::new(OutboundEvents::IsTest)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OutboundEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(OutboundEvents::ProcessedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(OutboundEvents::Table)
                    .col(OutboundEvents::SagaId)
                    .name("idx_outbound_events_saga_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboundEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OutboundEvents {
    Table,
    Id,
    Service,
    Topic,
    ClientId,
    Severity,
    TemplateId,
    Subject,
    Body,
    Payload,
    SagaId,
    CorrelationId,
    IsTest,
    CreatedAt,
    ProcessedAt,
}
