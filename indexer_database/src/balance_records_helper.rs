use anyhow::{Context, Result};
use sea_orm::{
    prelude::BigDecimal, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::entities::balance_records::{self, ActiveModel as BalanceRecordActiveModel, Model};
use crate::entities::prelude::BalanceRecords;

/// Loads the balance record of one user in one market
///
/// # Arguments
/// * `db` - Database connection handle
/// * `user_id` - Account identifier
/// * `market_id` - Market identifier
///
/// # Returns
/// * `Result<Option<Model>>` - `None` if the user never interacted with the market
pub async fn get_balance_record(
    db: &DatabaseConnection,
    user_id: &str,
    market_id: &str,
) -> Result<Option<Model>> {
    Ok(BalanceRecords::find()
        .filter(balance_records::Column::UserId.eq(user_id))
        .filter(balance_records::Column::MarketId.eq(market_id))
        .one(db)
        .await?)
}

/// Adds supply and borrow deltas to a balance record, creating it with zero
/// balances first if it does not exist yet
///
/// The read and the write run inside one transaction with the row locked.
///
/// # Arguments
/// * `db` - Database connection handle
/// * `user_id` - Account identifier
/// * `market_id` - Market identifier
/// * `supply_delta` - Signed change of the supply balance
/// * `borrow_delta` - Signed change of the borrow balance
///
/// # Returns
/// * `Result<Model>` - The record after the deltas were applied
pub async fn apply_balance_delta(
    db: &DatabaseConnection,
    user_id: &str,
    market_id: &str,
    supply_delta: BigDecimal,
    borrow_delta: BigDecimal,
) -> Result<Model> {
    let txn = db.begin().await?;
    let now = chrono::Utc::now().naive_utc();

    let existing = BalanceRecords::find()
        .filter(balance_records::Column::UserId.eq(user_id))
        .filter(balance_records::Column::MarketId.eq(market_id))
        .lock_exclusive()
        .one(&txn)
        .await?;

    let model = match existing {
        Some(model) => {
            let supply_balance = &model.supply_balance + supply_delta;
            let borrow_balance = &model.borrow_balance + borrow_delta;

            let mut active_model: BalanceRecordActiveModel = model.into();
            active_model.supply_balance = Set(supply_balance);
            active_model.borrow_balance = Set(borrow_balance);
            active_model.timestamp = Set(now);
            active_model.update(&txn).await?
        }
        None => {
            debug!("Creating balance record for {} in {}", user_id, market_id);
            BalanceRecordActiveModel {
                user_id: Set(user_id.to_owned()),
                market_id: Set(market_id.to_owned()),
                supply_balance: Set(supply_delta),
                borrow_balance: Set(borrow_delta),
                timestamp: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit()
        .await
        .context("Failed to commit balance delta")?;

    Ok(model)
}

/// Lists every market the user holds a balance record in, ordered by market id
pub async fn get_markets_for_user(db: &DatabaseConnection, user_id: &str) -> Result<Vec<String>> {
    let records = BalanceRecords::find()
        .filter(balance_records::Column::UserId.eq(user_id))
        .order_by_asc(balance_records::Column::MarketId)
        .all(db)
        .await?;
    Ok(records.into_iter().map(|record| record.market_id).collect())
}
