//! Redis connection pool.

use crate::error::StoreError;
use deadpool_redis::{redis, Config, Pool, Runtime};

/// Redis-backed adapter for store and pub/sub operations.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
    // Subscriptions need a dedicated connection outside the pool.
    pub(super) client: redis::Client,
    pub(super) channel: String,
}

impl RedisPool {
    /// Create a new RedisPool publishing notifications on `channel`.
    pub fn new(redis_url: &str, channel: &str) -> Result<Self, StoreError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::CreatePool(e.to_string()))?;
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            pool,
            client,
            channel: channel.to_string(),
        })
    }

    /// Round-trips a PING so startup fails fast when the store is down.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
