//! Database layer for SmartCost
//!
//! Postgres holds the durable cost records and budget alerts; Redis keeps
//! the short-lived fetch snapshots used for upstream-failure fallback.

mod postgres;
mod redis;

pub use postgres::{CostRepository, PostgresPool};
pub use redis::{RedisPool, SnapshotCache};

use crate::config::Config;
use crate::error::Result;

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
    /// Redis connection pool
    pub redis: RedisPool,
}

impl Database {
    /// Create a new database connection bundle
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;
        let redis = RedisPool::new(&config.redis)?;

        Ok(Self { postgres, redis })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.postgres.migrate().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.postgres.health_check().await?;
        self.redis.health_check().await?;
        Ok(())
    }
}
