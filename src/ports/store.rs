use crate::domain::jobs::{Job, JobKey, JobKind, JobStatus};
use crate::error::StoreError;
use async_trait::async_trait;

/// Shared job state: definitions, live status and active-task markers.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, key: &JobKey) -> Result<Option<Job>, StoreError>;

    async fn set(&self, key: &JobKey, job: &Job) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, key: &JobKey) -> Result<bool, StoreError>;

    /// Keys of every job of `kind`. Keys that do not parse are skipped.
    async fn list_keys(&self, kind: JobKind) -> Result<Vec<JobKey>, StoreError>;

    async fn is_task_running(&self, key: &JobKey) -> Result<bool, StoreError>;

    /// Atomically claims the active-task marker.
    /// Returns `false` when another worker already holds it.
    async fn register_task(&self, key: &JobKey) -> Result<bool, StoreError>;

    async fn clear_task(&self, key: &JobKey) -> Result<(), StoreError>;

    /// Drops every active-task marker, returning how many existed.
    async fn reset_tasks(&self) -> Result<usize, StoreError>;

    /// Read-modify-write of the status field.
    /// Returns `false` if the record no longer exists.
    async fn set_status(&self, key: &JobKey, status: JobStatus) -> Result<bool, StoreError> {
        match self.get(key).await? {
            Some(mut job) => {
                job.status = status;
                self.set(key, &job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resets the status of every job of `kind`.
    async fn reset_statuses(&self, kind: JobKind, status: JobStatus) -> Result<usize, StoreError> {
        let mut count = 0;
        for key in self.list_keys(kind).await? {
            match self.set_status(&key, status).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) if !e.is_unavailable() => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable job")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl<T: JobStore + ?Sized> JobStore for std::sync::Arc<T> {
    async fn get(&self, key: &JobKey) -> Result<Option<Job>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &JobKey, job: &Job) -> Result<(), StoreError> {
        (**self).set(key, job).await
    }

    async fn delete(&self, key: &JobKey) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn list_keys(&self, kind: JobKind) -> Result<Vec<JobKey>, StoreError> {
        (**self).list_keys(kind).await
    }

    async fn is_task_running(&self, key: &JobKey) -> Result<bool, StoreError> {
        (**self).is_task_running(key).await
    }

    async fn register_task(&self, key: &JobKey) -> Result<bool, StoreError> {
        (**self).register_task(key).await
    }

    async fn clear_task(&self, key: &JobKey) -> Result<(), StoreError> {
        (**self).clear_task(key).await
    }

    async fn reset_tasks(&self) -> Result<usize, StoreError> {
        (**self).reset_tasks().await
    }

    async fn set_status(&self, key: &JobKey, status: JobStatus) -> Result<bool, StoreError> {
        (**self).set_status(key, status).await
    }
}
