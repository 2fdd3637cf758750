/// Database Module
///
/// This module handles all PostgreSQL database operations including:
/// - Connection management (a single connection reused serially)
/// - Schema bootstrap for the star schema
/// - The statement catalog and the transactional warehouse handle
#[cfg(test)]
pub mod memory;
pub mod statements;
pub mod warehouse;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use warehouse::PgWarehouse;

pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the warehouse
    ///
    /// Both pipelines share one connection, so the pool is capped at one.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        Ok(Self { pool })
    }

    /// Create the star schema tables if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.context("Failed to create warehouse schema")?;

        tracing::info!("Warehouse schema is in place");
        Ok(())
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.context("Database connection test failed")?;

        Ok(())
    }

    /// Transactional handle the loaders write through
    pub fn warehouse(&self) -> PgWarehouse {
        PgWarehouse::new(self.pool.clone())
    }

    /// Release the connection; any transaction still open is rolled back by the server
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection closed");
    }
}
