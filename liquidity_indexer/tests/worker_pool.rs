use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use liquidity_indexer::{
    account_ledger::{AccountLedger, BalanceRecord, InMemoryAccountLedger},
    decimal::DecimalValue,
    error::{LiquidityError, Result},
    liquidity_engine::{EngineConfig, InMemoryAccountStore, LiquidityEngine, LiquidityRatio},
    market_registry::{seed_default_markets, InMemoryMarketRegistry, Market, MarketRegistry},
    models::{EventPosition, MarketEvent, UpdateNotification},
    update_driver::{RetryPolicy, UpdateDriver, UpdateWorkerPool, WorkerStats},
};

const DAI: &str = "0xb5e5d0f8c0cba267cd3d7035d6adc8eba7df7cdd";
const REP: &str = "0x0a1e4d0b5c71b955c0a5993023fc48ba6e380496";
const ZRX: &str = "0x19787bcf63e228a6669d905e90af397dca313cfc";

fn dec(value: &str) -> DecimalValue {
    value.parse().unwrap()
}

fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(1),
    }
}

fn notification(block: u64, user: &str, market: &str, event: MarketEvent) -> UpdateNotification {
    UpdateNotification::new(EventPosition::new(block, 0), user, market, event)
}

async fn seeded_engine(ledger: Arc<dyn AccountLedger>) -> Arc<LiquidityEngine> {
    let registry = Arc::new(InMemoryMarketRegistry::new());
    seed_default_markets(registry.as_ref()).await.unwrap();
    Arc::new(LiquidityEngine::new(
        registry,
        ledger,
        Arc::new(InMemoryAccountStore::new()),
        EngineConfig::default(),
    ))
}

/// Ledger whose first `failures` upserts report a store outage without writing
struct FlakyLedger {
    inner: InMemoryAccountLedger,
    failures: AtomicU32,
    upsert_calls: AtomicU32,
}

impl FlakyLedger {
    fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryAccountLedger::new(),
            failures: AtomicU32::new(failures),
            upsert_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AccountLedger for FlakyLedger {
    async fn get(&self, user_id: &str, market_id: &str) -> Result<Option<BalanceRecord>> {
        self.inner.get(user_id, market_id).await
    }

    async fn upsert(
        &self,
        user_id: &str,
        market_id: &str,
        supply_delta: DecimalValue,
        borrow_delta: DecimalValue,
    ) -> Result<BalanceRecord> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let outage = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if outage {
            return Err(LiquidityError::StoreUnavailable("connection reset".into()));
        }
        self.inner
            .upsert(user_id, market_id, supply_delta, borrow_delta)
            .await
    }

    async fn list_markets_for_user(&self, user_id: &str) -> Result<BTreeSet<String>> {
        self.inner.list_markets_for_user(user_id).await
    }
}

#[tokio::test]
async fn test_pool_matches_sequential_computation() {
    let engine = seeded_engine(Arc::new(InMemoryAccountLedger::new())).await;
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        4,
        8,
        fast_retries(3),
    );

    let users: Vec<String> = (0..40).map(|i| format!("user-{}", i)).collect();
    let mut block = 0;
    for (i, user) in users.iter().enumerate() {
        for (market, supply, borrow) in [(DAI, 100 + i as i64, 3), (REP, 2, i as i64)] {
            block += 1;
            pool.dispatch(notification(
                block,
                user,
                market,
                MarketEvent::Deposit {
                    amount: DecimalValue::from(supply),
                },
            ))
            .await
            .unwrap();
            block += 1;
            pool.dispatch(notification(
                block,
                user,
                market,
                MarketEvent::Borrow {
                    amount: DecimalValue::from(borrow),
                },
            ))
            .await
            .unwrap();
        }
    }

    let stats = pool.shutdown().await.unwrap();
    assert_eq!(
        stats,
        WorkerStats {
            applied: 160,
            skipped: 0,
            failed: 0
        }
    );

    for user in &users {
        let published = engine.account(user).await.unwrap().unwrap();
        let expected = engine.compute(user).await.unwrap();
        assert!(published.liquidity.is_identical(&expected), "{user}");
    }

    // user-0: 100 cDAI and 2 cREP supplied, 3 cDAI borrowed
    let first = engine.account("user-0").await.unwrap().unwrap();
    assert_eq!(first.liquidity.total_supply_in_reference_unit, dec("0.904"));
    assert_eq!(first.liquidity.total_borrow_in_reference_unit, dec("0.021"));
}

#[tokio::test]
async fn test_replayed_and_stale_notifications_are_skipped() {
    let engine = seeded_engine(Arc::new(InMemoryAccountLedger::new())).await;
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        2,
        8,
        fast_retries(3),
    );

    let deposit = |block| {
        notification(
            block,
            "alice",
            DAI,
            MarketEvent::Deposit { amount: dec("100") },
        )
    };

    pool.dispatch(deposit(5)).await.unwrap();
    pool.dispatch(deposit(5)).await.unwrap();
    pool.dispatch(deposit(4)).await.unwrap();
    pool.dispatch(deposit(6)).await.unwrap();

    let stats = pool.shutdown().await.unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.skipped, 2);

    let record = engine.ledger().get("alice", DAI).await.unwrap().unwrap();
    assert_eq!(record.supply_balance, dec("200"));
    let account = engine.account("alice").await.unwrap().unwrap();
    assert_eq!(account.liquidity.total_supply_in_reference_unit, dec("1.4"));
}

#[tokio::test]
async fn test_store_outage_is_retried_without_double_apply() {
    let ledger = Arc::new(FlakyLedger::new(2));
    let engine = seeded_engine(ledger.clone()).await;
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        1,
        4,
        fast_retries(5),
    );

    pool.dispatch(notification(
        1,
        "bob",
        REP,
        MarketEvent::Borrow { amount: dec("50") },
    ))
    .await
    .unwrap();

    let stats = pool.shutdown().await.unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(ledger.upsert_calls.load(Ordering::SeqCst), 3);

    let record = engine.ledger().get("bob", REP).await.unwrap().unwrap();
    assert_eq!(record.borrow_balance, dec("50"));
    let account = engine.account("bob").await.unwrap().unwrap();
    assert_eq!(account.liquidity.total_borrow_in_reference_unit, dec("5.1"));
}

#[tokio::test]
async fn test_exhausted_retries_leave_the_ledger_untouched() {
    let ledger = Arc::new(FlakyLedger::new(10));
    let engine = seeded_engine(ledger.clone()).await;
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        1,
        4,
        fast_retries(3),
    );

    pool.dispatch(notification(
        1,
        "bob",
        REP,
        MarketEvent::Deposit { amount: dec("1") },
    ))
    .await
    .unwrap();

    let stats = pool.shutdown().await.unwrap();
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.failed, 1);
    assert_eq!(ledger.upsert_calls.load(Ordering::SeqCst), 3);
    assert!(engine.ledger().get("bob", REP).await.unwrap().is_none());
    assert!(engine.account("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_market_fails_only_its_user() {
    let engine = seeded_engine(Arc::new(InMemoryAccountLedger::new())).await;
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        2,
        4,
        fast_retries(3),
    );

    pool.dispatch(notification(
        1,
        "mallory",
        "0x00000000000000000000000000000000000000ff",
        MarketEvent::Deposit { amount: dec("1") },
    ))
    .await
    .unwrap();
    pool.dispatch(notification(
        2,
        "carol",
        ZRX,
        MarketEvent::Deposit { amount: dec("1000") },
    ))
    .await
    .unwrap();

    let stats = pool.shutdown().await.unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.failed, 1);

    assert!(engine.account("mallory").await.unwrap().is_none());
    let carol = engine.account("carol").await.unwrap().unwrap();
    assert_eq!(carol.liquidity.total_supply_in_reference_unit, dec("2.2"));
    assert_eq!(carol.liquidity.liquidity_ratio, LiquidityRatio::Infinite);
}

#[tokio::test]
async fn test_stale_rate_observation_counts_as_skipped() {
    let engine = seeded_engine(Arc::new(InMemoryAccountLedger::new())).await;
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        2,
        8,
        fast_retries(3),
    );

    let rate = |block, user: &str, rate: &str| {
        notification(
            block,
            user,
            REP,
            MarketEvent::RateObserved {
                rate: dec(rate),
                symbol: None,
            },
        )
    };

    pool.dispatch(rate(10, "alice", "0.2")).await.unwrap();
    let stats = pool.shutdown().await.unwrap();
    assert_eq!(stats.applied, 1);

    // A fresh pool has no per-user history, so only the market's own position rejects it
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine.clone())),
        2,
        8,
        fast_retries(3),
    );
    pool.dispatch(rate(9, "bob", "0.3")).await.unwrap();
    let stats = pool.shutdown().await.unwrap();
    assert_eq!(
        stats,
        WorkerStats {
            applied: 0,
            skipped: 1,
            failed: 0
        }
    );

    assert!(engine.account("bob").await.unwrap().is_none());
    let market = engine.registry().get(REP).await.unwrap();
    assert_eq!(market.token_per_reference_ratio, dec("0.2"));
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            result.push(tail);
        }
    }
    result
}

#[test]
fn test_result_does_not_depend_on_accumulation_order() {
    let engine = LiquidityEngine::new(
        Arc::new(InMemoryMarketRegistry::new()),
        Arc::new(InMemoryAccountLedger::new()),
        Arc::new(InMemoryAccountStore::new()),
        EngineConfig::default(),
    );

    let position = |market_id: &str, rate: &str, factor: Option<&str>, supply: &str, borrow: &str| {
        let mut market = Market::new(market_id, dec(rate));
        market.collateral_factor = factor.map(dec);
        let mut record = BalanceRecord::empty("dave", market_id);
        record.supply_balance = dec(supply);
        record.borrow_balance = dec(borrow);
        (record, market)
    };

    // Three distinct factors, one of them written with two different scales
    let positions = vec![
        position(DAI, "0.007", None, "123.45", "0"),
        position(REP, "0.102", Some("1.25"), "0.3", "7.7"),
        position(ZRX, "0.0022", Some("1.250"), "999.999", "12"),
        position("cETH", "1", Some("2"), "0.0000001", "0.01"),
        position("cBAT", "0.002", None, "17", "3.333"),
    ];

    let expected = engine.aggregate(&positions).unwrap();
    assert!(!expected.liquidity_ratio.is_infinite());

    let orders = permutations(&positions);
    assert_eq!(orders.len(), 120);
    for order in orders {
        let liquidity = engine.aggregate(&order).unwrap();
        let ids: Vec<_> = order.iter().map(|(record, _)| record.market_id.as_str()).collect();
        assert!(liquidity.is_identical(&expected), "{ids:?}");
    }
}
