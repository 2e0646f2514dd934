use super::capture::CaptureStrategy;
use crate::domain::jobs::{JobKey, JobStatus};
use crate::domain::media::segment_path;
use crate::domain::schedule::Window;
use crate::error::{CaptureError, StoreError};
use crate::ports::clock::Clock;
use crate::ports::notify::NotificationChannel;
use crate::ports::store::JobStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs to know about the job it records.
#[derive(Debug, Clone)]
pub struct RecordingTask {
    pub key: JobKey,
    pub uri: String,
    pub output_dir: PathBuf,
    pub window: Window,
    pub segment: chrono::Duration,
    pub target_fps: Option<f64>,
    pub with_audio: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub reconnect_delay: Duration,
    pub extension: String,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The recording window closed.
    Completed,
    /// Shutdown was requested; the job goes back to `queued`.
    Cancelled,
    /// The job record was deleted while recording.
    Removed,
}

/// Drives one job from its start to its end time, one segment at a time.
pub struct RecordingWorker<S, N> {
    store: S,
    notifier: N,
    clock: Arc<dyn Clock>,
    strategy: Box<dyn CaptureStrategy>,
    task: RecordingTask,
    settings: WorkerSettings,
    cancel: CancellationToken,
    status: JobStatus,
    segments: usize,
}

impl<S, N> RecordingWorker<S, N>
where
    S: JobStore,
    N: NotificationChannel,
{
    pub fn new(
        store: S,
        notifier: N,
        clock: Arc<dyn Clock>,
        strategy: Box<dyn CaptureStrategy>,
        task: RecordingTask,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            strategy,
            task,
            settings,
            cancel,
            // The scheduler marks the job in progress before spawning.
            status: JobStatus::InProgress,
            segments: 0,
        }
    }

    /// Records until the window closes. Only store failures are returned;
    /// capture failures are retried for as long as the window is open.
    pub async fn run(mut self) -> Result<WorkerExit, StoreError> {
        let key = self.task.key.clone();
        let end = self.task.window.end;
        tracing::info!(key = %key, start = %self.task.window.start, end = %end, "worker started");

        let exit = 'window: loop {
            if self.cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            let now = self.clock.now();
            if now >= end {
                break WorkerExit::Completed;
            }
            let boundary = std::cmp::min(now + self.task.segment, end);
            let path = segment_path(&self.task.output_dir, now, &self.settings.extension);

            loop {
                match self.cycle(&path, boundary).await? {
                    Ok(()) => break,
                    Err(e) => {
                        tracing::warn!(key = %key, path = %path.display(), error = %e, "capture failed, reconnecting");
                        self.store.set_status(&key, JobStatus::Error).await?;
                        self.status = JobStatus::Error;

                        tokio::select! {
                            _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                            _ = self.cancel.cancelled() => {}
                        }
                        if self.cancel.is_cancelled() {
                            self.publish_partial(&path).await?;
                            break 'window WorkerExit::Cancelled;
                        }
                        let now = self.clock.now();
                        if now >= boundary {
                            self.publish_partial(&path).await?;
                            if now >= end {
                                tracing::warn!(key = %key, "window closed while the camera was failing");
                                break 'window WorkerExit::Completed;
                            }
                            tracing::warn!(key = %key, path = %path.display(), "segment boundary passed while capture was failing");
                            continue 'window;
                        }
                    }
                }
            }

            self.publish(&path).await?;

            if self.store.get(&key).await?.is_none() {
                break WorkerExit::Removed;
            }
        };

        self.store.clear_task(&key).await?;
        match exit {
            WorkerExit::Completed => {
                self.store.set_status(&key, JobStatus::Completed).await?;
            }
            WorkerExit::Cancelled => {
                self.store.set_status(&key, JobStatus::Queued).await?;
            }
            WorkerExit::Removed => {}
        }
        tracing::info!(key = %key, segments = self.segments, exit = ?exit, "worker finished");
        Ok(exit)
    }

    /// One connect + capture attempt. The outer error is the store's.
    async fn cycle(
        &mut self,
        path: &Path,
        until: chrono::NaiveDateTime,
    ) -> Result<Result<(), CaptureError>, StoreError> {
        if let Err(e) = self.strategy.connect().await {
            return Ok(Err(e));
        }
        if self.status != JobStatus::InProgress {
            tracing::info!(key = %self.task.key, "camera recovered");
            self.store
                .set_status(&self.task.key, JobStatus::InProgress)
                .await?;
            self.status = JobStatus::InProgress;
        }
        Ok(self
            .strategy
            .capture(path, until, self.clock.as_ref(), &self.cancel)
            .await)
    }

    async fn publish(&mut self, path: &Path) -> Result<(), StoreError> {
        self.notifier.publish(path).await?;
        self.segments += 1;
        tracing::info!(key = %self.task.key, path = %path.display(), "segment finished");
        Ok(())
    }

    async fn publish_partial(&mut self, path: &Path) -> Result<(), StoreError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            self.publish(path).await?;
        }
        Ok(())
    }
}
