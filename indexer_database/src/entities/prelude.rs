pub use super::balance_records::Entity as BalanceRecords;
pub use super::markets::Entity as Markets;
pub use super::user_accounts::Entity as UserAccounts;
