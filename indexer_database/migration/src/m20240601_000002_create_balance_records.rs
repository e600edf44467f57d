use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BalanceRecords::Table)
                    .if_not_exists()
                    .col(pk_auto(BalanceRecords::Id))
                    .col(string(BalanceRecords::MarketId))
                    .col(string(BalanceRecords::UserId))
                    .col(decimal(BalanceRecords::SupplyBalance))
                    .col(decimal(BalanceRecords::BorrowBalance))
                    .col(timestamp(BalanceRecords::Timestamp))
                    .index(
                        Index::create()
                            .name("idx_balance_records_market_user")
                            .unique()
                            .col(BalanceRecords::MarketId)
                            .col(BalanceRecords::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        // Recompute lists every market of one user
        manager
            .create_index(
                Index::create()
                    .name("idx_balance_records_user")
                    .table(BalanceRecords::Table)
                    .col(BalanceRecords::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BalanceRecords::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum BalanceRecords {
    Table,
    Id,
    MarketId,
    UserId,
    SupplyBalance,
    BorrowBalance,
    Timestamp,
}
