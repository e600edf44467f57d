pub mod worker_pool;

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    decimal::DecimalValue,
    error::{LiquidityError, Result},
    liquidity_engine::{LiquidityEngine, UserAccount},
    market_registry::ensure_positive_factor,
    models::{MarketEvent, UpdateNotification},
};

pub use worker_pool::{RetryPolicy, UpdateWorkerPool, WorkerStats};

/// Applies update notifications to the ledger or the registry and triggers the
/// recomputation of the affected account
///
/// The driver holds no state of its own. Ordering and deduplication of
/// notifications are handled by [`UpdateWorkerPool`].
pub struct UpdateDriver {
    engine: Arc<LiquidityEngine>,
}

impl UpdateDriver {
    pub fn new(engine: Arc<LiquidityEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LiquidityEngine> {
        &self.engine
    }

    /// Applies the notification and recomputes the user's account
    pub async fn handle(&self, notification: &UpdateNotification) -> Result<UserAccount> {
        self.apply(notification).await?;
        self.engine.recompute(&notification.user).await
    }

    /// Writes the effect of a notification to the ledger or the registry
    ///
    /// Returns `false` when the notification changed nothing, which only happens
    /// for a rate observation older than the market's current rate.
    pub async fn apply(&self, notification: &UpdateNotification) -> Result<bool> {
        let UpdateNotification {
            position,
            user,
            market,
            event,
        } = notification;

        debug!(
            "Applying {} at {} for user {} in market {}",
            event.name(),
            position,
            user,
            market
        );

        match event {
            MarketEvent::RateObserved { rate, symbol } => {
                let applied = self
                    .engine
                    .registry()
                    .observe_rate(market, symbol.clone(), rate.clone(), *position)
                    .await?;
                if !applied {
                    return Ok(false);
                }
                info!("Market {} rate is now {} (at {})", market, rate, position);
            }
            MarketEvent::CollateralFactorChanged { factor } => {
                ensure_positive_factor(factor)?;
                self.engine
                    .registry()
                    .set_collateral_factor(market, factor.clone())
                    .await?;
                info!("Market {} collateral factor is now {}", market, factor);
            }
            balance_event => {
                let (supply_delta, borrow_delta) = balance_deltas(balance_event)?;
                self.engine
                    .ledger()
                    .upsert(user, market, supply_delta, borrow_delta)
                    .await?;
            }
        }

        Ok(true)
    }
}

/// (supply delta, borrow delta) of a balance-changing event
fn balance_deltas(event: &MarketEvent) -> Result<(DecimalValue, DecimalValue)> {
    let zero = DecimalValue::zero();
    let (amount, deltas) = match event {
        MarketEvent::Deposit { amount } => (amount, (amount.clone(), zero)),
        MarketEvent::Withdraw { amount } => (amount, (-amount.clone(), zero)),
        MarketEvent::Borrow { amount } => (amount, (zero, amount.clone())),
        MarketEvent::Repay { amount } => (amount, (zero, -amount.clone())),
        other => {
            return Err(LiquidityError::InvalidArgument(format!(
                "{} does not change balances",
                other.name()
            )))
        }
    };

    if amount.is_negative() {
        return Err(LiquidityError::InvalidArgument(format!(
            "{} amount must not be negative, got {}",
            event.name(),
            amount
        )));
    }

    Ok(deltas)
}
