use std::str::FromStr;

use anyhow::{bail, Context, Result};

use super::env_helper::{load_env_var, load_env_var_or};
use crate::{
    decimal::DecimalValue,
    utils::constants::{DEFAULT_COLLATERAL_FACTOR, DIVISION_PRECISION},
};

/// Where markets, balances and published accounts are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown storage backend {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub events_source: String,
    pub worker_count: usize,
    pub worker_queue_size: usize,
    pub max_store_retries: u32,
    pub store_retry_delay_ms: u64,
    pub default_collateral_factor: DecimalValue,
    pub division_precision: u64,
    pub seed_default_markets: bool,
    pub port: u16,
    pub log_inside_file: bool,
}

impl LocalConfig {
    pub fn load_from_env() -> Result<Self> {
        let storage_backend = load_env_var_or("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(load_env_var("DATABASE_URL")?),
            StorageBackend::Memory => None,
        };

        let default_collateral_factor: String =
            load_env_var_or("DEFAULT_COLLATERAL_FACTOR", DEFAULT_COLLATERAL_FACTOR.to_string())?;
        let default_collateral_factor = DecimalValue::from_decimal_string(&default_collateral_factor)
            .context("DEFAULT_COLLATERAL_FACTOR is not a decimal")?;

        let config = Self {
            storage_backend,
            database_url,
            events_source: load_env_var_or("EVENTS_SOURCE", "-".to_string())?,
            worker_count: load_env_var_or("WORKER_COUNT", 8)?,
            worker_queue_size: load_env_var_or("WORKER_QUEUE_SIZE", 200)?,
            max_store_retries: load_env_var_or("MAX_STORE_RETRIES", 5)?,
            store_retry_delay_ms: load_env_var_or("STORE_RETRY_DELAY_MS", 1000)?,
            default_collateral_factor,
            division_precision: load_env_var_or("DIVISION_PRECISION", DIVISION_PRECISION)?,
            seed_default_markets: load_env_var_or("SEED_DEFAULT_MARKETS", false)?,
            port: load_env_var_or("PORT", 8080)?,
            log_inside_file: load_env_var_or("LOG_INSIDE_FILE", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_collateral_factor <= DecimalValue::zero() {
            bail!(
                "DEFAULT_COLLATERAL_FACTOR must be positive, got {}",
                self.default_collateral_factor
            );
        }
        if self.division_precision == 0 {
            bail!("DIVISION_PRECISION must be positive");
        }
        if self.worker_count == 0 || self.worker_queue_size == 0 {
            bail!("WORKER_COUNT and WORKER_QUEUE_SIZE must be positive");
        }
        Ok(())
    }
}
