//! Redis connection and snapshot caching

use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::error::{Error, Result};
use crate::models::CostSnapshot;

/// Snapshots older than this are not served as a fallback
pub const SNAPSHOT_TTL_SECONDS: u64 = 3600;

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl RedisPool {
    /// Create a new Redis connection pool
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let cfg = RedisPoolConfig::from_url(&config.url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Cache(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::Cache(e.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

/// Cache for the most recent fetched cost snapshot per subscription.
///
/// Entries expire after one hour; within that window a cached snapshot is
/// served when the billing API is unavailable.
#[derive(Clone)]
pub struct SnapshotCache {
    pool: Pool,
}

impl SnapshotCache {
    /// Create a new snapshot cache
    pub fn new(pool: &RedisPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }

    fn key(subscription_id: &str) -> String {
        format!("smartcost:snapshot:{subscription_id}")
    }

    /// Store a snapshot with the standard TTL
    pub async fn put(&self, snapshot: &CostSnapshot) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::Cache(e.to_string()))?;

        let payload = serde_json::to_string(snapshot)?;
        let _: () = conn
            .set_ex(
                Self::key(&snapshot.subscription_id),
                payload,
                SNAPSHOT_TTL_SECONDS,
            )
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;

        Ok(())
    }

    /// Fetch the cached snapshot for a subscription, if one is still live
    pub async fn get(&self, subscription_id: &str) -> Result<Option<CostSnapshot>> {
        let mut conn = self.pool.get().await.map_err(|e| Error::Cache(e.to_string()))?;

        let payload: Option<String> = conn
            .get(Self::key(subscription_id))
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Drop the cached snapshot for a subscription
    pub async fn invalidate(&self, subscription_id: &str) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::Cache(e.to_string()))?;

        let _: () = conn
            .del(Self::key(subscription_id))
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;

        Ok(())
    }
}
