use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{decimal::DecimalValue, utils::address_helper::normalize_id};

/// Place of an event in the chain's total order
///
/// Positions compare by block number first, then by log index inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// Decoded lending-protocol event, already reduced to what the ledger and the
/// registry need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    Deposit {
        amount: DecimalValue,
    },
    Withdraw {
        amount: DecimalValue,
    },
    Borrow {
        amount: DecimalValue,
    },
    Repay {
        amount: DecimalValue,
    },
    RateObserved {
        rate: DecimalValue,
        #[serde(default)]
        symbol: Option<String>,
    },
    CollateralFactorChanged {
        factor: DecimalValue,
    },
}

impl MarketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::Deposit { .. } => "deposit",
            MarketEvent::Withdraw { .. } => "withdraw",
            MarketEvent::Borrow { .. } => "borrow",
            MarketEvent::Repay { .. } => "repay",
            MarketEvent::RateObserved { .. } => "rate_observed",
            MarketEvent::CollateralFactorChanged { .. } => "collateral_factor_changed",
        }
    }
}

/// One update delivered by the event layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNotification {
    #[serde(flatten)]
    pub position: EventPosition,
    pub user: String,
    pub market: String,
    pub event: MarketEvent,
}

impl UpdateNotification {
    pub fn new(
        position: EventPosition,
        user: impl Into<String>,
        market: impl Into<String>,
        event: MarketEvent,
    ) -> Self {
        Self {
            position,
            user: user.into(),
            market: market.into(),
            event,
        }
    }

    /// Same notification with address-like ids in canonical form
    pub fn normalized(mut self) -> Self {
        self.user = normalize_id(&self.user);
        self.market = normalize_id(&self.market);
        self
    }
}
