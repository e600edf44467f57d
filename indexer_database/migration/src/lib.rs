pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_markets;
mod m20240601_000002_create_balance_records;
mod m20240601_000003_create_user_accounts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_markets::Migration),
            Box::new(m20240601_000002_create_balance_records::Migration),
            Box::new(m20240601_000003_create_user_accounts::Migration),
        ]
    }
}
