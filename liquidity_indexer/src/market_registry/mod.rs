use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    decimal::DecimalValue,
    error::{LiquidityError, Result},
    models::EventPosition,
    utils::constants::DEFAULT_MARKETS,
};

/// Market metadata needed to value balances in the reference unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Market {
    pub id: String,
    pub symbol: Option<String>,
    /// Reference units per one unit of the market's underlying token
    pub token_per_reference_ratio: DecimalValue,
    /// Overrides the engine-wide collateral factor when set
    pub collateral_factor: Option<DecimalValue>,
    pub last_observed_at: Option<EventPosition>,
}

impl Market {
    pub fn new(id: impl Into<String>, token_per_reference_ratio: DecimalValue) -> Self {
        Self {
            id: id.into(),
            symbol: None,
            token_per_reference_ratio,
            collateral_factor: None,
            last_observed_at: None,
        }
    }

    /// Converts a token-denominated amount to the reference unit
    pub fn to_reference_unit(&self, amount: &DecimalValue) -> Result<DecimalValue> {
        amount.checked_mul(&self.token_per_reference_ratio)
    }

    /// Whether an observation at `position` is newer than the last applied one
    pub fn accepts_observation(&self, position: EventPosition) -> bool {
        self.last_observed_at.map_or(true, |last| position > last)
    }
}

pub(crate) fn ensure_positive_factor(factor: &DecimalValue) -> Result<()> {
    if *factor <= DecimalValue::zero() {
        return Err(LiquidityError::InvalidArgument(format!(
            "collateral factor must be positive, got {}",
            factor
        )));
    }
    Ok(())
}

/// Registry of known markets and their exchange rates
///
/// Reads return owned snapshots, so a recomputation keeps using the rate it
/// read even if a newer one lands meanwhile.
#[async_trait]
pub trait MarketRegistry: Send + Sync {
    /// Fails with [`LiquidityError::MarketNotFound`] if the market was never registered
    async fn get(&self, market_id: &str) -> Result<Market>;

    /// Registers a market or overwrites its rate, last write wins. The symbol is
    /// only written when provided.
    async fn upsert_with_symbol(
        &self,
        market_id: &str,
        symbol: Option<String>,
        rate: DecimalValue,
    ) -> Result<()>;

    /// Applies a rate coming from a chain event, ignoring observations that are
    /// not newer than the last one applied to this market
    ///
    /// Returns whether the observation was applied.
    async fn observe_rate(
        &self,
        market_id: &str,
        symbol: Option<String>,
        rate: DecimalValue,
        position: EventPosition,
    ) -> Result<bool>;

    async fn set_collateral_factor(&self, market_id: &str, factor: DecimalValue) -> Result<()>;

    /// Every registered market ordered by id
    async fn list(&self) -> Result<Vec<Market>>;

    async fn upsert(&self, market_id: &str, rate: DecimalValue) -> Result<()> {
        self.upsert_with_symbol(market_id, None, rate).await
    }
}

/// Registers the built-in market list with its static rates
pub async fn seed_default_markets(registry: &dyn MarketRegistry) -> Result<()> {
    for (market_id, symbol, rate) in DEFAULT_MARKETS {
        registry
            .upsert_with_symbol(
                market_id,
                Some(symbol.to_string()),
                DecimalValue::from_decimal_string(rate)?,
            )
            .await?;
        info!("Seeded market {} ({}) at rate {}", symbol, market_id, rate);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryMarketRegistry {
    markets: RwLock<BTreeMap<String, Market>>,
}

impl InMemoryMarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketRegistry for InMemoryMarketRegistry {
    async fn get(&self, market_id: &str) -> Result<Market> {
        self.markets
            .read()
            .await
            .get(market_id)
            .cloned()
            .ok_or_else(|| LiquidityError::MarketNotFound(market_id.to_string()))
    }

    async fn upsert_with_symbol(
        &self,
        market_id: &str,
        symbol: Option<String>,
        rate: DecimalValue,
    ) -> Result<()> {
        let mut markets = self.markets.write().await;
        let market = markets
            .entry(market_id.to_string())
            .or_insert_with(|| Market::new(market_id, rate.clone()));
        market.token_per_reference_ratio = rate;
        if symbol.is_some() {
            market.symbol = symbol;
        }
        Ok(())
    }

    async fn observe_rate(
        &self,
        market_id: &str,
        symbol: Option<String>,
        rate: DecimalValue,
        position: EventPosition,
    ) -> Result<bool> {
        let mut markets = self.markets.write().await;
        let market = markets
            .entry(market_id.to_string())
            .or_insert_with(|| Market::new(market_id, rate.clone()));

        if !market.accepts_observation(position) {
            debug!(
                "Ignoring stale rate for market {} at {} (last {:?})",
                market_id, position, market.last_observed_at
            );
            return Ok(false);
        }

        market.token_per_reference_ratio = rate;
        market.last_observed_at = Some(position);
        if symbol.is_some() {
            market.symbol = symbol;
        }
        Ok(true)
    }

    async fn set_collateral_factor(&self, market_id: &str, factor: DecimalValue) -> Result<()> {
        ensure_positive_factor(&factor)?;
        let mut markets = self.markets.write().await;
        let market = markets
            .get_mut(market_id)
            .ok_or_else(|| LiquidityError::MarketNotFound(market_id.to_string()))?;
        market.collateral_factor = Some(factor);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Market>> {
        Ok(self.markets.read().await.values().cloned().collect())
    }
}
