use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    prelude::BigDecimal, sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};

use crate::entities::prelude::UserAccounts;
use crate::entities::user_accounts::{self, ActiveModel as UserAccountActiveModel};

/// Derived liquidity figures of one account, as persisted
#[derive(Debug, Clone)]
pub struct UserAccountDetails {
    pub user_id: String,
    pub total_supply_in_reference_unit: BigDecimal,
    pub total_borrow_in_reference_unit: BigDecimal,
    /// `None` when the account has no borrow
    pub liquidity_ratio: Option<BigDecimal>,
    pub available_to_borrow_in_reference_unit: BigDecimal,
    pub timestamp: DateTime<Utc>,
}

impl From<user_accounts::Model> for UserAccountDetails {
    fn from(model: user_accounts::Model) -> Self {
        Self {
            user_id: model.user_id,
            total_supply_in_reference_unit: model.total_supply_in_reference_unit,
            total_borrow_in_reference_unit: model.total_borrow_in_reference_unit,
            liquidity_ratio: model.liquidity_ratio,
            available_to_borrow_in_reference_unit: model.available_to_borrow_in_reference_unit,
            timestamp: DateTime::from_naive_utc_and_offset(model.timestamp, Utc),
        }
    }
}

/// Retrieves the last published account figures of a user
///
/// # Returns
///
/// * `Result<Option<UserAccountDetails>>` - `None` if nothing was published for the user yet
pub async fn get_user_account(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Option<UserAccountDetails>> {
    let account = UserAccounts::find()
        .filter(user_accounts::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok(account.map(UserAccountDetails::from))
}

/// Publishes the account figures of a user
///
/// All derived columns are written by a single `INSERT .. ON CONFLICT DO UPDATE`
/// statement, so readers never observe a partially updated row.
pub async fn save_user_account(db: &DatabaseConnection, account: UserAccountDetails) -> Result<()> {
    let active_model = UserAccountActiveModel {
        user_id: Set(account.user_id),
        total_supply_in_reference_unit: Set(account.total_supply_in_reference_unit),
        total_borrow_in_reference_unit: Set(account.total_borrow_in_reference_unit),
        liquidity_ratio: Set(account.liquidity_ratio),
        available_to_borrow_in_reference_unit: Set(account.available_to_borrow_in_reference_unit),
        timestamp: Set(account.timestamp.naive_utc()),
        ..Default::default()
    };

    UserAccounts::insert(active_model)
        .on_conflict(
            OnConflict::column(user_accounts::Column::UserId)
                .update_columns([
                    user_accounts::Column::TotalSupplyInReferenceUnit,
                    user_accounts::Column::TotalBorrowInReferenceUnit,
                    user_accounts::Column::LiquidityRatio,
                    user_accounts::Column::AvailableToBorrowInReferenceUnit,
                    user_accounts::Column::Timestamp,
                ])
                .to_owned(),
        )
        .exec(db)
        .await
        .context("Failed to save user account")?;

    Ok(())
}
