use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserAccounts::Table)
                    .if_not_exists()
                    .col(pk_auto(UserAccounts::Id))
                    .col(string(UserAccounts::UserId))
                    .col(decimal(UserAccounts::TotalSupplyInReferenceUnit))
                    .col(decimal(UserAccounts::TotalBorrowInReferenceUnit))
                    // NULL when the user has no borrow (infinite ratio)
                    .col(decimal_null(UserAccounts::LiquidityRatio))
                    .col(decimal(UserAccounts::AvailableToBorrowInReferenceUnit))
                    .col(timestamp(UserAccounts::Timestamp))
                    .index(
                        Index::create()
                            .name("idx_user_accounts_user_id")
                            .unique()
                            .col(UserAccounts::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAccounts::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserAccounts {
    Table,
    Id,
    UserId,
    TotalSupplyInReferenceUnit,
    TotalBorrowInReferenceUnit,
    LiquidityRatio,
    AvailableToBorrowInReferenceUnit,
    Timestamp,
}
