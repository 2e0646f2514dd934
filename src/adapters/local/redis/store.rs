//! Redis JobStore implementation.

use super::pool::RedisPool;
use super::TASK_PATTERN;
use crate::domain::jobs::{Job, JobKey, JobKind};
use crate::error::StoreError;
use crate::ports::store::JobStore;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

#[async_trait]
impl JobStore for RedisPool {
    async fn get(&self, key: &JobKey) -> Result<Option<Job>, StoreError> {
        let mut conn = self.pool.get().await?;
        let key = key.to_string();
        let json: Option<String> = conn.get(&key).await?;
        match json {
            Some(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(|source| StoreError::Serialization { key, source }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &JobKey, job: &Job) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let key = key.to_string();
        let json = serde_json::to_string(job).map_err(|source| StoreError::Serialization {
            key: key.clone(),
            source,
        })?;
        conn.set::<_, _, ()>(&key, json).await?;
        Ok(())
    }

    async fn delete(&self, key: &JobKey) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let removed: i64 = conn.del(key.to_string()).await?;
        Ok(removed > 0)
    }

    async fn list_keys(&self, kind: JobKind) -> Result<Vec<JobKey>, StoreError> {
        let mut conn = self.pool.get().await?;
        let raw: Vec<String> = conn.keys(format!("{}:*", kind.prefix())).await?;
        Ok(raw
            .iter()
            .filter_map(|k| match k.parse() {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unparsable job key");
                    None
                }
            })
            .collect())
    }

    async fn is_task_running(&self, key: &JobKey) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.exists::<_, bool>(key.task_key()).await?)
    }

    async fn register_task(&self, key: &JobKey) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        // SETNX makes the claim atomic across concurrent schedulers.
        Ok(conn.set_nx::<_, _, bool>(key.task_key(), 0i64).await?)
    }

    async fn clear_task(&self, key: &JobKey) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key.task_key()).await?;
        Ok(())
    }

    async fn reset_tasks(&self) -> Result<usize, StoreError> {
        let mut conn = self.pool.get().await?;
        let keys: Vec<String> = conn.keys(TASK_PATTERN).await?;
        if !keys.is_empty() {
            conn.del::<_, ()>(&keys).await?;
        }
        Ok(keys.len())
    }
}
