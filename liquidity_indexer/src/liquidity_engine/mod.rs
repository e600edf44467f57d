mod account_store;
mod models;

pub use account_store::{AccountStore, InMemoryAccountStore};
pub use models::{AccountLiquidity, LiquidityRatio, UserAccount};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::{
    account_ledger::{AccountLedger, BalanceRecord},
    config::LocalConfig,
    decimal::DecimalValue,
    error::{LiquidityError, Result},
    market_registry::{Market, MarketRegistry},
    utils::constants::{DEFAULT_COLLATERAL_FACTOR, DIVISION_PRECISION},
};

/// Parameters of the liquidity computation
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Used for every market that has no collateral factor of its own
    pub default_collateral_factor: DecimalValue,
    /// Significant digits kept by the ratio and capacity divisions
    pub division_precision: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_collateral_factor: DecimalValue::from_decimal_string(
                DEFAULT_COLLATERAL_FACTOR,
            )
            .unwrap_or_else(|_| DecimalValue::new(15, -1)),
            division_precision: DIVISION_PRECISION,
        }
    }
}

impl From<&LocalConfig> for EngineConfig {
    fn from(local_config: &LocalConfig) -> Self {
        Self {
            default_collateral_factor: local_config.default_collateral_factor.clone(),
            division_precision: local_config.division_precision,
        }
    }
}

/// Recomputes the derived liquidity figures of a user from the ledger and the
/// market registry, and publishes them as a [`UserAccount`].
///
/// The cost of a recomputation is linear in the number of markets the user
/// holds a balance record in.
pub struct LiquidityEngine {
    registry: Arc<dyn MarketRegistry>,
    ledger: Arc<dyn AccountLedger>,
    accounts: Arc<dyn AccountStore>,
    config: EngineConfig,
}

impl LiquidityEngine {
    pub fn new(
        registry: Arc<dyn MarketRegistry>,
        ledger: Arc<dyn AccountLedger>,
        accounts: Arc<dyn AccountStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            accounts,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<dyn MarketRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<dyn AccountLedger> {
        &self.ledger
    }

    /// Computes the figures of a user without publishing them
    ///
    /// A market the user has a balance in but that is missing from the registry
    /// aborts the computation with [`LiquidityError::MarketNotFound`]: skipping
    /// it would understate the user's borrow.
    pub async fn compute(&self, user_id: &str) -> Result<AccountLiquidity> {
        let market_ids = self.ledger.list_markets_for_user(user_id).await?;

        let mut positions = Vec::with_capacity(market_ids.len());
        for market_id in &market_ids {
            let record = self.ledger.get(user_id, market_id).await?.ok_or_else(|| {
                LiquidityError::BalanceNotFound {
                    user: user_id.to_string(),
                    market: market_id.clone(),
                }
            })?;
            let market = self.registry.get(market_id).await?;
            positions.push((record, market));
        }

        self.aggregate(&positions)
    }

    /// Folds balance records, each paired with its market, into account figures
    ///
    /// Every step is exact except the two divisions, which run once per
    /// distinct collateral factor, so the result is bit-identical whatever the
    /// order of `positions`.
    pub fn aggregate(&self, positions: &[(BalanceRecord, Market)]) -> Result<AccountLiquidity> {
        if positions.is_empty() {
            return Ok(AccountLiquidity::empty());
        }

        let mut total_supply = DecimalValue::zero();
        let mut total_borrow = DecimalValue::zero();
        // (collateral factor, supply value of the markets using it)
        let mut supply_by_factor: Vec<(DecimalValue, DecimalValue)> = Vec::new();

        for (record, market) in positions {
            let supply_in_reference_unit = market.to_reference_unit(&record.supply_balance)?;
            let borrow_in_reference_unit = market.to_reference_unit(&record.borrow_balance)?;

            let collateral_factor = market
                .collateral_factor
                .as_ref()
                .unwrap_or(&self.config.default_collateral_factor);
            match supply_by_factor
                .iter_mut()
                .find(|(factor, _)| factor == collateral_factor)
            {
                Some((_, supply)) => *supply = supply.checked_add(&supply_in_reference_unit)?,
                None => supply_by_factor
                    .push((collateral_factor.clone(), supply_in_reference_unit.clone())),
            }

            total_supply = total_supply.checked_add(&supply_in_reference_unit)?;
            total_borrow = total_borrow.checked_add(&borrow_in_reference_unit)?;
        }

        let precision = self.config.division_precision;

        let liquidity_ratio = if total_borrow.is_zero() {
            LiquidityRatio::Infinite
        } else {
            LiquidityRatio::Finite(total_supply.checked_div_with_precision(&total_borrow, precision)?)
        };

        let mut borrow_capacity = DecimalValue::zero();
        for (collateral_factor, supply) in &supply_by_factor {
            let capacity = supply.checked_div_with_precision(collateral_factor, precision)?;
            borrow_capacity = borrow_capacity.checked_add(&capacity)?;
        }

        Ok(AccountLiquidity {
            available_to_borrow_in_reference_unit: borrow_capacity.checked_sub(&total_borrow)?,
            total_supply_in_reference_unit: total_supply,
            total_borrow_in_reference_unit: total_borrow,
            liquidity_ratio,
        })
    }

    /// Computes and publishes the account of a user
    ///
    /// Nothing is written unless every step succeeds, so a failed recomputation
    /// leaves the previously published account in place.
    #[instrument("RECOMPUTE", skip(self), level = "debug")]
    pub async fn recompute(&self, user_id: &str) -> Result<UserAccount> {
        let liquidity = self.compute(user_id).await?;

        let account = UserAccount {
            id: user_id.to_string(),
            liquidity,
            updated_at: Utc::now(),
        };
        self.accounts.save(&account).await?;

        debug!(
            "Account {} supply {} borrow {} ratio {} available {}",
            account.id,
            account.liquidity.total_supply_in_reference_unit,
            account.liquidity.total_borrow_in_reference_unit,
            account.liquidity.liquidity_ratio,
            account.liquidity.available_to_borrow_in_reference_unit
        );

        Ok(account)
    }

    /// Last published account of a user
    pub async fn account(&self, user_id: &str) -> Result<Option<UserAccount>> {
        self.accounts.get(user_id).await
    }
}
