use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(herald_outbound_migration::Migrator).await;
}
