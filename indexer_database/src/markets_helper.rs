use anyhow::{Context, Result};
use sea_orm::{
    prelude::BigDecimal, sea_query::OnConflict, ActiveModelTrait, ColumnTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::debug;

use crate::entities::markets::{self, ActiveModel as MarketActiveModel, Model};
use crate::entities::prelude::Markets;

/// Position of the chain event that produced a rate observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObservedAt {
    pub block_number: i64,
    pub log_index: i64,
}

/// Loads a single market by id
pub async fn get_market(db: &DatabaseConnection, market_id: &str) -> Result<Option<Model>> {
    Ok(Markets::find_by_id(market_id.to_owned()).one(db).await?)
}

/// Loads every registered market ordered by id
pub async fn get_all_markets(db: &DatabaseConnection) -> Result<Vec<Model>> {
    Ok(Markets::find()
        .order_by_asc(markets::Column::Id)
        .all(db)
        .await?)
}

/// Registers a market or overwrites its exchange rate (last write wins)
///
/// # Arguments
/// * `db` - Database connection handle
/// * `market_id` - Market identifier
/// * `symbol` - Optional display symbol, only written when provided
/// * `token_per_reference_ratio` - Reference units per one unit of the underlying token
pub async fn upsert_market_rate(
    db: &DatabaseConnection,
    market_id: &str,
    symbol: Option<String>,
    token_per_reference_ratio: BigDecimal,
) -> Result<()> {
    let mut update_columns = vec![
        markets::Column::TokenPerReferenceRatio,
        markets::Column::Timestamp,
    ];
    if symbol.is_some() {
        update_columns.push(markets::Column::Symbol);
    }

    let model = MarketActiveModel {
        id: Set(market_id.to_owned()),
        symbol: Set(symbol),
        token_per_reference_ratio: Set(token_per_reference_ratio),
        collateral_factor: Set(None),
        last_observed_block: Set(None),
        last_observed_log_index: Set(None),
        timestamp: Set(chrono::Utc::now().naive_utc()),
    };

    Markets::insert(model)
        .on_conflict(
            OnConflict::column(markets::Column::Id)
                .update_columns(update_columns)
                .to_owned(),
        )
        .exec(db)
        .await
        .context("Failed to upsert market rate")?;

    Ok(())
}

/// Applies a rate observation only if it is newer than the last one stored
///
/// The market row is locked for the duration of the check so concurrent
/// observations for the same market are serialized.
///
/// # Returns
/// * `Result<bool>` - `true` when the observation was written
pub async fn observe_market_rate(
    db: &DatabaseConnection,
    market_id: &str,
    symbol: Option<String>,
    token_per_reference_ratio: BigDecimal,
    observed_at: ObservedAt,
) -> Result<bool> {
    let txn = db.begin().await?;

    let existing = Markets::find_by_id(market_id.to_owned())
        .lock_exclusive()
        .one(&txn)
        .await?;

    let now = chrono::Utc::now().naive_utc();

    match existing {
        None => {
            MarketActiveModel {
                id: Set(market_id.to_owned()),
                symbol: Set(symbol),
                token_per_reference_ratio: Set(token_per_reference_ratio),
                collateral_factor: Set(None),
                last_observed_block: Set(Some(observed_at.block_number)),
                last_observed_log_index: Set(Some(observed_at.log_index)),
                timestamp: Set(now),
            }
            .insert(&txn)
            .await?;
        }
        Some(model) => {
            let last_observed = model
                .last_observed_block
                .zip(model.last_observed_log_index)
                .map(|(block_number, log_index)| ObservedAt {
                    block_number,
                    log_index,
                });

            if last_observed.is_some_and(|last| observed_at <= last) {
                debug!(
                    "Ignoring stale rate for market {} at {:?} (last {:?})",
                    market_id, observed_at, last_observed
                );
                txn.commit().await?;
                return Ok(false);
            }

            let mut active_model: MarketActiveModel = model.into();
            if symbol.is_some() {
                active_model.symbol = Set(symbol);
            }
            active_model.token_per_reference_ratio = Set(token_per_reference_ratio);
            active_model.last_observed_block = Set(Some(observed_at.block_number));
            active_model.last_observed_log_index = Set(Some(observed_at.log_index));
            active_model.timestamp = Set(now);
            active_model.update(&txn).await?;
        }
    }

    txn.commit().await?;
    Ok(true)
}

/// Sets the per-market collateral factor
///
/// # Returns
/// * `Result<bool>` - `false` when no market with this id exists
pub async fn set_collateral_factor(
    db: &DatabaseConnection,
    market_id: &str,
    collateral_factor: BigDecimal,
) -> Result<bool> {
    let result = Markets::update_many()
        .set(MarketActiveModel {
            collateral_factor: Set(Some(collateral_factor)),
            timestamp: Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        })
        .filter(markets::Column::Id.eq(market_id))
        .exec(db)
        .await
        .context("Failed to update collateral factor")?;

    Ok(result.rows_affected > 0)
}
