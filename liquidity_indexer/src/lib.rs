pub mod account_ledger;
pub mod config;
pub mod decimal;
pub mod error;
pub mod event_feed;
pub mod liquidity_engine;
pub mod market_registry;
pub mod models;
pub mod storage;
pub mod update_driver;
pub mod utils;
