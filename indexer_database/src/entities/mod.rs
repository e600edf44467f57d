//! SeaORM entities for the liquidity tables.

pub mod prelude;

pub mod balance_records;
pub mod markets;
pub mod user_accounts;
