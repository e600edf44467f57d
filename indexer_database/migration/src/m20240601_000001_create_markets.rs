use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Markets::Table)
                    .if_not_exists()
                    .col(string(Markets::Id).primary_key())
                    .col(string_null(Markets::Symbol))
                    .col(decimal(Markets::TokenPerReferenceRatio))
                    .col(decimal_null(Markets::CollateralFactor))
                    .col(big_integer_null(Markets::LastObservedBlock))
                    .col(big_integer_null(Markets::LastObservedLogIndex))
                    .col(timestamp(Markets::Timestamp))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Markets::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Markets {
    Table,
    Id,
    Symbol,
    TokenPerReferenceRatio,
    CollateralFactor,
    LastObservedBlock,
    LastObservedLogIndex,
    Timestamp,
}
