//! In-memory `JobStore`, sharing the record format of the Redis store.

use crate::domain::jobs::{Job, JobKey, JobKind};
use crate::error::StoreError;
use crate::ports::store::JobStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    // Serialized like the Redis values so both stores fail on the same records.
    records: BTreeMap<String, String>,
    tasks: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw value under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock().records.insert(key.to_string(), value.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get(&self, key: &JobKey) -> Result<Option<Job>, StoreError> {
        let key = key.to_string();
        let raw = self.lock().records.get(&key).cloned();
        raw.map(|data| {
            serde_json::from_str(&data).map_err(|source| StoreError::Serialization { key, source })
        })
        .transpose()
    }

    async fn set(&self, key: &JobKey, job: &Job) -> Result<(), StoreError> {
        let key = key.to_string();
        let json = serde_json::to_string(job).map_err(|source| StoreError::Serialization {
            key: key.clone(),
            source,
        })?;
        self.lock().records.insert(key, json);
        Ok(())
    }

    async fn delete(&self, key: &JobKey) -> Result<bool, StoreError> {
        Ok(self.lock().records.remove(&key.to_string()).is_some())
    }

    async fn list_keys(&self, kind: JobKind) -> Result<Vec<JobKey>, StoreError> {
        let prefix = format!("{}:", kind.prefix());
        Ok(self
            .lock()
            .records
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .filter_map(|k| k.parse().ok())
            .collect())
    }

    async fn is_task_running(&self, key: &JobKey) -> Result<bool, StoreError> {
        Ok(self.lock().tasks.contains(&key.task_key()))
    }

    async fn register_task(&self, key: &JobKey) -> Result<bool, StoreError> {
        Ok(self.lock().tasks.insert(key.task_key()))
    }

    async fn clear_task(&self, key: &JobKey) -> Result<(), StoreError> {
        self.lock().tasks.remove(&key.task_key());
        Ok(())
    }

    async fn reset_tasks(&self) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let count = state.tasks.len();
        state.tasks.clear();
        Ok(count)
    }
}
