use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::decimal::DecimalValue;

/// Total supply value over total borrow value
///
/// An account without borrow has no finite ratio; it is reported as
/// [`LiquidityRatio::Infinite`] instead of failing the division.
#[derive(Debug, Clone, PartialEq)]
pub enum LiquidityRatio {
    Finite(DecimalValue),
    Infinite,
}

impl LiquidityRatio {
    pub fn as_finite(&self) -> Option<&DecimalValue> {
        match self {
            LiquidityRatio::Finite(ratio) => Some(ratio),
            LiquidityRatio::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, LiquidityRatio::Infinite)
    }

    fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (LiquidityRatio::Finite(a), LiquidityRatio::Finite(b)) => a.is_identical(b),
            (LiquidityRatio::Infinite, LiquidityRatio::Infinite) => true,
            _ => false,
        }
    }
}

impl From<Option<DecimalValue>> for LiquidityRatio {
    fn from(ratio: Option<DecimalValue>) -> Self {
        ratio.map_or(LiquidityRatio::Infinite, LiquidityRatio::Finite)
    }
}

impl fmt::Display for LiquidityRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidityRatio::Finite(ratio) => fmt::Display::fmt(ratio, f),
            LiquidityRatio::Infinite => f.write_str("infinite"),
        }
    }
}

impl Serialize for LiquidityRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Derived figures of one account, all in the reference unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountLiquidity {
    pub total_supply_in_reference_unit: DecimalValue,
    pub total_borrow_in_reference_unit: DecimalValue,
    pub liquidity_ratio: LiquidityRatio,
    pub available_to_borrow_in_reference_unit: DecimalValue,
}

impl AccountLiquidity {
    pub fn empty() -> Self {
        Self {
            total_supply_in_reference_unit: DecimalValue::zero(),
            total_borrow_in_reference_unit: DecimalValue::zero(),
            liquidity_ratio: LiquidityRatio::Infinite,
            available_to_borrow_in_reference_unit: DecimalValue::zero(),
        }
    }

    /// Digit-for-digit equality of every figure
    pub fn is_identical(&self, other: &Self) -> bool {
        self.total_supply_in_reference_unit
            .is_identical(&other.total_supply_in_reference_unit)
            && self
                .total_borrow_in_reference_unit
                .is_identical(&other.total_borrow_in_reference_unit)
            && self.liquidity_ratio.is_identical(&other.liquidity_ratio)
            && self
                .available_to_borrow_in_reference_unit
                .is_identical(&other.available_to_borrow_in_reference_unit)
    }
}

/// Published account record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccount {
    pub id: String,
    #[serde(flatten)]
    pub liquidity: AccountLiquidity,
    pub updated_at: DateTime<Utc>,
}
