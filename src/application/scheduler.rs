//! The due-job matcher: a polling loop over the job store.

use super::launcher::WorkerLauncher;
use super::worker::RecordingTask;
use crate::domain::jobs::{Job, JobKey, JobKind, JobStatus};
use crate::domain::schedule::Window;
use crate::error::StoreError;
use crate::ports::clock::Clock;
use crate::ports::store::JobStore;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub scan_interval: Duration,
    /// Segment length for records that carry none.
    pub default_segment_minutes: u32,
}

pub struct Scheduler<S, L> {
    store: S,
    launcher: L,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
}

impl<S, L> Scheduler<S, L>
where
    S: JobStore,
    L: WorkerLauncher,
{
    pub fn new(store: S, launcher: L, clock: Arc<dyn Clock>, settings: SchedulerSettings) -> Self {
        Self {
            store,
            launcher,
            clock,
            settings,
        }
    }

    /// Workers only live inside the scheduler process, so every marker
    /// found at startup belongs to a dead one.
    pub async fn startup_sweep(&self) -> Result<(), StoreError> {
        let markers = self.store.reset_tasks().await?;
        let recurring = self
            .store
            .reset_statuses(JobKind::Recurring, JobStatus::Queued)
            .await?;
        tracing::info!(markers, recurring, "cleared stale task state");
        Ok(())
    }

    /// Polls until `cancel` fires. Returns only on cancellation or when the
    /// store becomes unreachable.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), StoreError> {
        tracing::info!(interval = ?self.settings.scan_interval, "scheduler started");
        while !cancel.is_cancelled() {
            if self.tick().await? > 0 {
                // More jobs may be waiting; spawns stay serialized but back to back.
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.settings.scan_interval) => {}
            }
        }
        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// One scan: starts at most one due job of each kind, recurring first.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let mut started = 0;
        for kind in [JobKind::Recurring, JobKind::OneOff] {
            if self.start_next(kind).await? {
                started += 1;
            }
        }
        Ok(started)
    }

    async fn start_next(&self, kind: JobKind) -> Result<bool, StoreError> {
        let now = self.clock.now();
        for key in self.store.list_keys(kind).await? {
            match self.try_start(&key, now).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if !e.is_unavailable() => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable job");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    async fn try_start(&self, key: &JobKey, now: NaiveDateTime) -> Result<bool, StoreError> {
        let Some(job) = self.store.get(key).await? else {
            return Ok(false);
        };
        if job.schedule.kind() != key.kind {
            tracing::warn!(key = %key, "schedule does not match the key namespace, skipping");
            return Ok(false);
        }
        if let Err(reason) = job.schedule.validate() {
            tracing::warn!(key = %key, reason, "malformed schedule, skipping");
            return Ok(false);
        }
        if !job.schedule.is_open(now) || self.store.is_task_running(key).await? {
            return Ok(false);
        }

        let window = job.schedule.window_at(now);
        if window.end <= now {
            return Ok(false);
        }
        if let Err(e) = tokio::fs::create_dir_all(&job.path).await {
            tracing::warn!(key = %key, path = %job.path.display(), error = %e, "cannot create output directory, skipping");
            return Ok(false);
        }
        if !self.store.register_task(key).await? {
            tracing::debug!(key = %key, "claimed by another tick");
            return Ok(false);
        }
        self.store.set_status(key, JobStatus::InProgress).await?;

        let task = self.task_for(key, &job, window);
        tracing::info!(key = %key, start = %window.start, end = %window.end, "starting worker");
        self.launcher.launch(task);
        Ok(true)
    }

    fn task_for(&self, key: &JobKey, job: &Job, window: Window) -> RecordingTask {
        let minutes = match job.segment_minutes {
            0 => self.settings.default_segment_minutes,
            m => m,
        };
        RecordingTask {
            key: key.clone(),
            uri: job.rtsp_url.clone(),
            output_dir: job.path.clone(),
            window,
            segment: chrono::Duration::minutes(i64::from(minutes)),
            target_fps: job.target_fps(),
            with_audio: job.with_audio,
        }
    }
}
