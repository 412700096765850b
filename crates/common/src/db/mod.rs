//! Database layer for DocVault
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management
//! - Listing query composition

pub mod models;
pub mod query;
mod repository;

#[cfg(test)]
pub(crate) mod test_support;

pub use query::{DocumentFilter, Page, PageRequest};
pub use repository::{EnrichmentUpdate, NewDocumentImage, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: Arc<DatabaseConnection>,

    /// Read replica connection (optional)
    pub replica: Option<Arc<DatabaseConnection>>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");
        let primary = connect(config, &config.url, "primary").await?;

        let replica = match config.read_url {
            Some(ref read_url) => {
                info!("Connecting to read replica...");
                Some(connect(config, read_url, "replica").await?)
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self {
            primary: Arc::new(primary),
            replica: replica.map(Arc::new),
        })
    }

    /// Wrap an existing connection; reads and writes share it
    pub fn from_connection(primary: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self {
            primary: primary.into(),
            replica: None,
        }
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_deref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        ping(&self.primary, "primary").await?;

        if let Some(ref replica) = self.replica {
            ping(replica, "replica").await?;
        }

        Ok(())
    }
}

async fn connect(config: &DatabaseConfig, url: &str, role: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(true);

    Database::connect(opts)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {}: {}", role, e),
        })
}

async fn ping(conn: &DatabaseConnection, role: &str) -> Result<()> {
    conn.execute_unprepared("SELECT 1")
        .await
        .map(|_| ())
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("{} ping failed: {}", role, e),
        })
}
