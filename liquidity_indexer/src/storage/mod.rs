//! PostgreSQL-backed implementations of the registry, ledger and account store.
//!
//! Connection failures are reported as [`LiquidityError::StoreUnavailable`] and
//! rejected statements as [`LiquidityError::Store`];
//! retrying is left to the update workers.

use std::collections::BTreeSet;

use async_trait::async_trait;
use indexer_database::{
    balance_records_helper,
    entities::{balance_records, markets},
    markets_helper::{self, ObservedAt},
    user_accounts_helper::{self, UserAccountDetails},
};
use sea_orm::DatabaseConnection;

use crate::{
    account_ledger::{AccountLedger, BalanceRecord},
    decimal::DecimalValue,
    error::{LiquidityError, Result},
    liquidity_engine::{AccountLiquidity, AccountStore, UserAccount},
    market_registry::{ensure_positive_factor, Market, MarketRegistry},
    models::EventPosition,
};

fn observed_at(position: EventPosition) -> Result<ObservedAt> {
    let to_column = |value: u64| {
        i64::try_from(value).map_err(|_| {
            LiquidityError::InvalidArgument(format!("event position {} out of range", position))
        })
    };
    Ok(ObservedAt {
        block_number: to_column(position.block_number)?,
        log_index: to_column(position.log_index)?,
    })
}

fn market_from_model(model: markets::Model) -> Market {
    let last_observed_at = model
        .last_observed_block
        .zip(model.last_observed_log_index)
        .map(|(block_number, log_index)| {
            EventPosition::new(block_number as u64, log_index as u64)
        });

    Market {
        id: model.id,
        symbol: model.symbol,
        token_per_reference_ratio: model.token_per_reference_ratio.into(),
        collateral_factor: model.collateral_factor.map(DecimalValue::from),
        last_observed_at,
    }
}

fn balance_record_from_model(model: balance_records::Model) -> BalanceRecord {
    BalanceRecord {
        user_id: model.user_id,
        market_id: model.market_id,
        supply_balance: model.supply_balance.into(),
        borrow_balance: model.borrow_balance.into(),
    }
}

pub struct PostgresMarketRegistry {
    db: DatabaseConnection,
}

impl PostgresMarketRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MarketRegistry for PostgresMarketRegistry {
    async fn get(&self, market_id: &str) -> Result<Market> {
        markets_helper::get_market(&self.db, market_id)
            .await?
            .map(market_from_model)
            .ok_or_else(|| LiquidityError::MarketNotFound(market_id.to_string()))
    }

    async fn upsert_with_symbol(
        &self,
        market_id: &str,
        symbol: Option<String>,
        rate: DecimalValue,
    ) -> Result<()> {
        markets_helper::upsert_market_rate(&self.db, market_id, symbol, rate.into()).await?;
        Ok(())
    }

    async fn observe_rate(
        &self,
        market_id: &str,
        symbol: Option<String>,
        rate: DecimalValue,
        position: EventPosition,
    ) -> Result<bool> {
        let applied = markets_helper::observe_market_rate(
            &self.db,
            market_id,
            symbol,
            rate.into(),
            observed_at(position)?,
        )
        .await?;
        Ok(applied)
    }

    async fn set_collateral_factor(&self, market_id: &str, factor: DecimalValue) -> Result<()> {
        ensure_positive_factor(&factor)?;
        let updated =
            markets_helper::set_collateral_factor(&self.db, market_id, factor.into()).await?;
        if !updated {
            return Err(LiquidityError::MarketNotFound(market_id.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Market>> {
        Ok(markets_helper::get_all_markets(&self.db)
            .await?
            .into_iter()
            .map(market_from_model)
            .collect())
    }
}

pub struct PostgresAccountLedger {
    db: DatabaseConnection,
}

impl PostgresAccountLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountLedger for PostgresAccountLedger {
    async fn get(&self, user_id: &str, market_id: &str) -> Result<Option<BalanceRecord>> {
        Ok(
            balance_records_helper::get_balance_record(&self.db, user_id, market_id)
                .await?
                .map(balance_record_from_model),
        )
    }

    async fn upsert(
        &self,
        user_id: &str,
        market_id: &str,
        supply_delta: DecimalValue,
        borrow_delta: DecimalValue,
    ) -> Result<BalanceRecord> {
        let model = balance_records_helper::apply_balance_delta(
            &self.db,
            user_id,
            market_id,
            supply_delta.into(),
            borrow_delta.into(),
        )
        .await?;
        Ok(balance_record_from_model(model))
    }

    async fn list_markets_for_user(&self, user_id: &str) -> Result<BTreeSet<String>> {
        Ok(balance_records_helper::get_markets_for_user(&self.db, user_id)
            .await?
            .into_iter()
            .collect())
    }
}

pub struct PostgresAccountStore {
    db: DatabaseConnection,
}

impl PostgresAccountStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let details = user_accounts_helper::get_user_account(&self.db, user_id).await?;
        Ok(details.map(|details| UserAccount {
            id: details.user_id,
            liquidity: AccountLiquidity {
                total_supply_in_reference_unit: details.total_supply_in_reference_unit.into(),
                total_borrow_in_reference_unit: details.total_borrow_in_reference_unit.into(),
                liquidity_ratio: details.liquidity_ratio.map(DecimalValue::from).into(),
                available_to_borrow_in_reference_unit: details
                    .available_to_borrow_in_reference_unit
                    .into(),
            },
            updated_at: details.timestamp,
        }))
    }

    async fn save(&self, account: &UserAccount) -> Result<()> {
        let liquidity = &account.liquidity;
        let details = UserAccountDetails {
            user_id: account.id.clone(),
            total_supply_in_reference_unit: (&liquidity.total_supply_in_reference_unit).into(),
            total_borrow_in_reference_unit: (&liquidity.total_borrow_in_reference_unit).into(),
            liquidity_ratio: liquidity.liquidity_ratio.as_finite().map(Into::into),
            available_to_borrow_in_reference_unit: (&liquidity
                .available_to_borrow_in_reference_unit)
                .into(),
            timestamp: account.updated_at,
        };
        user_accounts_helper::save_user_account(&self.db, details).await?;
        Ok(())
    }
}
