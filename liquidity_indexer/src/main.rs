use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use indexer_database::IndexerDatabase;
use liquidity_indexer::{
    account_ledger::{AccountLedger, InMemoryAccountLedger},
    config::{LocalConfig, StorageBackend},
    event_feed::EventFeed,
    liquidity_engine::{AccountStore, EngineConfig, InMemoryAccountStore, LiquidityEngine},
    market_registry::{seed_default_markets, InMemoryMarketRegistry, MarketRegistry},
    storage::{PostgresAccountLedger, PostgresAccountStore, PostgresMarketRegistry},
    update_driver::{RetryPolicy, UpdateDriver, UpdateWorkerPool},
    utils,
};
use tracing::{error, info};

struct Stores {
    registry: Arc<dyn MarketRegistry>,
    ledger: Arc<dyn AccountLedger>,
    accounts: Arc<dyn AccountStore>,
}

async fn start_health_check_server(port: u16) -> Result<()> {
    let app = Router::new().route("/health", get(|| async { "OK" }));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting health check server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

/// Main entry point for the Liquidity Indexer
///
/// This function performs the following steps:
/// 1. Initializes the pre-run environment
/// 2. Builds the stores for the configured backend
/// 3. Starts the update workers and the event feed
/// 4. Runs until the event source is exhausted or a service fails
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let Some(local_config) = init_pre_run().await? else {
        return Ok(());
    };
    let local_config = Arc::new(local_config);

    info!("Starting the Liquidity Indexer");

    let stores = build_stores(&local_config).await?;
    if local_config.seed_default_markets {
        seed_default_markets(stores.registry.as_ref()).await?;
    }

    let engine = Arc::new(LiquidityEngine::new(
        stores.registry,
        stores.ledger,
        stores.accounts,
        EngineConfig::from(local_config.as_ref()),
    ));
    let pool = UpdateWorkerPool::new(
        Arc::new(UpdateDriver::new(engine)),
        local_config.worker_count,
        local_config.worker_queue_size,
        RetryPolicy {
            max_attempts: local_config.max_store_retries,
            delay: Duration::from_millis(local_config.store_retry_delay_ms),
        },
    );

    let event_feed = EventFeed::start_event_feed(&local_config, pool).await?;
    let health_check_handle = tokio::spawn(start_health_check_server(local_config.port));

    tokio::select! {
        result = event_feed => {
            match result {
                Ok(Ok(stats)) => {
                    info!(
                        "Indexer stopped: {} applied, {} skipped, {} failed",
                        stats.applied, stats.skipped, stats.failed
                    );
                    Ok(())
                }
                Ok(Err(e)) => {
                    let error_message = e.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(" -> ");
                    error!("Event feed failed with error: {}", error_message);
                    Err(anyhow::anyhow!("Event feed failed: {}", error_message))
                }
                Err(e) => {
                    error!("Event feed task panicked: {}", e);
                    Err(anyhow::anyhow!("Event feed task panicked: {}", e))
                }
            }
        }
        result = health_check_handle => {
            match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("Health check server stopped")),
                Ok(Err(e)) => {
                    let error_message = e.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(" -> ");
                    error!("Health check server failed with error: {}", error_message);
                    Err(anyhow::anyhow!("Health check server failed: {}", error_message))
                }
                Err(e) => {
                    error!("Health check task panicked: {}", e);
                    Err(anyhow::anyhow!("Health check task panicked: {}", e))
                }
            }
        }
    }
}

/// Initializes the pre-run environment
///
/// This function performs the following steps:
/// 1. Loads environment variables from the `.env` file, if any
/// 2. Loads the local configuration and sets up the logger
/// 3. Resets the database and stops if the `reset` argument is provided
/// 4. Runs the pending migrations when the postgres backend is selected
///
/// # Returns
/// * `Result<Option<LocalConfig>>` - `None` when the process should exit after a reset
async fn init_pre_run() -> Result<Option<LocalConfig>> {
    dotenvy::dotenv().ok();
    let local_config = LocalConfig::load_from_env().context("Failed to load configuration")?;
    utils::logger::setup_logger(local_config.log_inside_file)
        .context("Failed to setup logger")?;

    let Some(database_url) = local_config.database_url.as_deref() else {
        return Ok(Some(local_config));
    };

    // read the first argument
    let args = std::env::args().collect::<Vec<String>>();
    if args.len() > 1 && args[1] == "reset" {
        info!("Resetting the database");
        IndexerDatabase::reset(database_url).await?;
        info!("Database reset");
        return Ok(None);
    }

    info!("Initializing the database");
    IndexerDatabase::init(database_url)
        .await
        .context("Failed to initialize the database")?;
    info!("Database initialized");

    Ok(Some(local_config))
}

async fn build_stores(local_config: &LocalConfig) -> Result<Stores> {
    match (local_config.storage_backend, local_config.database_url.as_deref()) {
        (StorageBackend::Postgres, Some(database_url)) => {
            let db = IndexerDatabase::get_postgres_connection(database_url).await?;
            Ok(Stores {
                registry: Arc::new(PostgresMarketRegistry::new(db.clone())),
                ledger: Arc::new(PostgresAccountLedger::new(db.clone())),
                accounts: Arc::new(PostgresAccountStore::new(db)),
            })
        }
        (StorageBackend::Postgres, None) => anyhow::bail!("DATABASE_URL is not set"),
        (StorageBackend::Memory, _) => {
            info!("Using in-memory storage, nothing is persisted");
            Ok(Stores {
                registry: Arc::new(InMemoryMarketRegistry::new()),
                ledger: Arc::new(InMemoryAccountLedger::new()),
                accounts: Arc::new(InMemoryAccountStore::new()),
            })
        }
    }
}
