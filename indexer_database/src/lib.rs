pub mod balance_records_helper;
pub mod entities;
pub mod markets_helper;
pub mod user_accounts_helper;

use std::time::Duration;

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};
use tracing::info;

/// Static entry points for connecting to the liquidity database and managing its schema.
pub struct IndexerDatabase;

impl IndexerDatabase {
    /// Connects to the database and applies every pending migration.
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn init(database_url: &str) -> Result<()> {
        let connection = Self::get_postgres_connection(database_url).await?;
        Migrator::up(&connection, None)
            .await
            .context("Failed to apply migrations")?;
        Ok(())
    }

    /// Rolls back every migration and applies them again, leaving empty tables.
    pub async fn reset(database_url: &str) -> Result<()> {
        let connection = Self::get_postgres_connection(database_url).await?;
        info!("Rolling back all migrations");
        Migrator::down(&connection, None).await?;
        Migrator::up(&connection, None).await?;
        Ok(())
    }

    /// Opens a pooled connection to PostgreSQL.
    ///
    /// The pool keeps between 2 and 6 connections, recycles each one after two
    /// minutes and has SQL statement logging disabled.
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Returns
    /// * `Result<DatabaseConnection>` - The pooled connection handle
    pub async fn get_postgres_connection(database_url: &str) -> Result<DatabaseConnection> {
        let mut options = ConnectOptions::new(database_url.to_owned());

        options.sqlx_logging(false);
        options.min_connections(2);
        options.max_connections(6);

        options.max_lifetime(Duration::from_secs(60 * 2));

        let db = sea_orm::Database::connect(options)
            .await
            .context("Failed to connect to the database")?;

        Ok(db)
    }
}
