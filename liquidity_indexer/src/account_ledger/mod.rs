use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{decimal::DecimalValue, error::Result};

/// Balances of one user in one market, denominated in the market's underlying token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRecord {
    pub user_id: String,
    pub market_id: String,
    pub supply_balance: DecimalValue,
    pub borrow_balance: DecimalValue,
}

impl BalanceRecord {
    pub fn empty(user_id: impl Into<String>, market_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            market_id: market_id.into(),
            supply_balance: DecimalValue::zero(),
            borrow_balance: DecimalValue::zero(),
        }
    }

    fn apply(&mut self, supply_delta: &DecimalValue, borrow_delta: &DecimalValue) -> Result<()> {
        let supply_balance = self.supply_balance.checked_add(supply_delta)?;
        let borrow_balance = self.borrow_balance.checked_add(borrow_delta)?;
        self.supply_balance = supply_balance;
        self.borrow_balance = borrow_balance;
        Ok(())
    }
}

/// Per-user, per-market balance storage
///
/// There is at most one record per (market, user) pair. A missing record is the
/// normal state of a user that never touched the market.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn get(&self, user_id: &str, market_id: &str) -> Result<Option<BalanceRecord>>;

    /// Adds the deltas to the record, creating a zero-balance record first if needed
    async fn upsert(
        &self,
        user_id: &str,
        market_id: &str,
        supply_delta: DecimalValue,
        borrow_delta: DecimalValue,
    ) -> Result<BalanceRecord>;

    /// Every market the user has a record in, zero-balance records included
    async fn list_markets_for_user(&self, user_id: &str) -> Result<BTreeSet<String>>;
}

#[derive(Debug, Default)]
pub struct InMemoryAccountLedger {
    // user id -> market id -> record
    records: RwLock<BTreeMap<String, BTreeMap<String, BalanceRecord>>>,
}

impl InMemoryAccountLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountLedger for InMemoryAccountLedger {
    async fn get(&self, user_id: &str, market_id: &str) -> Result<Option<BalanceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(user_id)
            .and_then(|markets| markets.get(market_id))
            .cloned())
    }

    async fn upsert(
        &self,
        user_id: &str,
        market_id: &str,
        supply_delta: DecimalValue,
        borrow_delta: DecimalValue,
    ) -> Result<BalanceRecord> {
        let mut records = self.records.write().await;
        let markets = records.entry(user_id.to_string()).or_default();

        let mut record = markets
            .get(market_id)
            .cloned()
            .unwrap_or_else(|| BalanceRecord::empty(user_id, market_id));
        record.apply(&supply_delta, &borrow_delta)?;

        markets.insert(market_id.to_string(), record.clone());
        Ok(record)
    }

    async fn list_markets_for_user(&self, user_id: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .records
            .read()
            .await
            .get(user_id)
            .map(|markets| markets.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> DecimalValue {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn test_absent_record_is_not_an_error() {
        let ledger = InMemoryAccountLedger::new();
        assert_eq!(ledger.get("alice", "cDAI").await.unwrap(), None);
        assert!(ledger.list_markets_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_accumulates_deltas() {
        let ledger = InMemoryAccountLedger::new();
        ledger
            .upsert("alice", "cDAI", dec("100"), DecimalValue::zero())
            .await
            .unwrap();
        ledger
            .upsert("alice", "cDAI", dec("-25.5"), dec("10"))
            .await
            .unwrap();

        let record = ledger.get("alice", "cDAI").await.unwrap().unwrap();
        assert_eq!(record.supply_balance, dec("74.5"));
        assert_eq!(record.borrow_balance, dec("10"));
    }

    #[tokio::test]
    async fn test_list_markets_keeps_zero_balance_records() {
        let ledger = InMemoryAccountLedger::new();
        ledger
            .upsert("alice", "cREP", dec("5"), DecimalValue::zero())
            .await
            .unwrap();
        ledger
            .upsert("alice", "cREP", dec("-5"), DecimalValue::zero())
            .await
            .unwrap();
        ledger
            .upsert("alice", "cDAI", dec("1"), DecimalValue::zero())
            .await
            .unwrap();
        ledger
            .upsert("bob", "cZRX", dec("1"), DecimalValue::zero())
            .await
            .unwrap();

        let markets: Vec<_> = ledger
            .list_markets_for_user("alice")
            .await
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(markets, vec!["cDAI".to_string(), "cREP".to_string()]);
    }
}
