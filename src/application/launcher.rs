//! Spawning and supervising recording workers.

use super::capture::CaptureFactory;
use super::worker::{RecordingTask, RecordingWorker, WorkerSettings};
use crate::domain::jobs::JobStatus;
use crate::ports::clock::Clock;
use crate::ports::notify::NotificationChannel;
use crate::ports::store::JobStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Starts a worker for a claimed job without waiting for it.
#[cfg_attr(test, mockall::automock)]
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, task: RecordingTask);
}

impl<T: WorkerLauncher + ?Sized> WorkerLauncher for Arc<T> {
    fn launch(&self, task: RecordingTask) {
        (**self).launch(task)
    }
}

/// Runs each worker as its own tokio task, watched by a supervisor task.
///
/// A worker that panics or loses the store has its job flagged `error` by
/// the supervisor, which clears the marker one reconnect delay later so a
/// later tick can pick the job up again. Nothing a worker does reaches the
/// scheduler loop.
pub struct TaskLauncher<S, N> {
    store: S,
    notifier: N,
    clock: Arc<dyn Clock>,
    factory: Arc<dyn CaptureFactory>,
    settings: WorkerSettings,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<S, N> TaskLauncher<S, N>
where
    S: JobStore + Clone + 'static,
    N: NotificationChannel + Clone + 'static,
{
    pub fn new(
        store: S,
        notifier: N,
        clock: Arc<dyn Clock>,
        factory: Arc<dyn CaptureFactory>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            factory,
            settings,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of workers (and supervisors) still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Asks every worker to finish its current segment, then waits for all
    /// of them to exit.
    pub async fn shutdown(&self) {
        tracing::info!(workers = self.tracker.len() / 2, "stopping workers");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl<S, N> WorkerLauncher for TaskLauncher<S, N>
where
    S: JobStore + Clone + 'static,
    N: NotificationChannel + Clone + 'static,
{
    fn launch(&self, task: RecordingTask) {
        let key = task.key.clone();
        let strategy = self.factory.create(&task);
        let worker = RecordingWorker::new(
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            strategy,
            task,
            self.settings.clone(),
            self.cancel.child_token(),
        );

        let handle = self.tracker.spawn(worker.run());
        let store = self.store.clone();
        let cancel = self.cancel.clone();
        let hold = self.settings.reconnect_delay;
        self.tracker.spawn(async move {
            let failure = match handle.await {
                Ok(Ok(_)) => return,
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            tracing::error!(key = %key, error = %failure, "worker died");
            // The marker stays claimed for one reconnect delay, so a job that
            // crashes on start is not respawned by the very next tick.
            tokio::select! {
                _ = tokio::time::sleep(hold) => {}
                _ = cancel.cancelled() => {}
            }
            if let Err(e) = store.clear_task(&key).await {
                tracing::error!(key = %key, error = %e, "cannot clear marker of dead worker");
            }
            if let Err(e) = store.set_status(&key, JobStatus::Error).await {
                tracing::error!(key = %key, error = %e, "cannot flag dead worker");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::events::EventHub;
    use crate::adapters::local::memory::MemoryStore;
    use crate::application::capture::CaptureStrategy;
    use crate::application::scheduler::{Scheduler, SchedulerSettings};
    use crate::domain::jobs::{Job, JobKey, JobKind, Schedule};
    use crate::domain::schedule::Window;
    use crate::error::CaptureError;
    use crate::ports::clock::MonotonicClock;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    struct Exploding;

    #[async_trait]
    impl CaptureStrategy for Exploding {
        async fn connect(&mut self) -> Result<(), CaptureError> {
            panic!("decoder crashed");
        }

        async fn capture(
            &mut self,
            _path: &Path,
            _until: NaiveDateTime,
            _clock: &dyn Clock,
            _cancel: &CancellationToken,
        ) -> Result<(), CaptureError> {
            Ok(())
        }
    }

    /// Never connects, so the worker keeps retrying until cancelled.
    struct Offline;

    #[async_trait]
    impl CaptureStrategy for Offline {
        async fn connect(&mut self) -> Result<(), CaptureError> {
            Err(CaptureError::EndOfStream)
        }

        async fn capture(
            &mut self,
            _path: &Path,
            _until: NaiveDateTime,
            _clock: &dyn Clock,
            _cancel: &CancellationToken,
        ) -> Result<(), CaptureError> {
            Ok(())
        }
    }

    fn exploding() -> Box<dyn CaptureStrategy> {
        Box::new(Exploding)
    }

    fn offline() -> Box<dyn CaptureStrategy> {
        Box::new(Offline)
    }

    struct Fixed(fn() -> Box<dyn CaptureStrategy>);

    impl CaptureFactory for Fixed {
        fn create(&self, _task: &RecordingTask) -> Box<dyn CaptureStrategy> {
            (self.0)()
        }
    }

    /// Counts the workers it hands out, all of which crash.
    struct Crashing(Arc<AtomicUsize>);

    impl CaptureFactory for Crashing {
        fn create(&self, _task: &RecordingTask) -> Box<dyn CaptureStrategy> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::new(Exploding)
        }
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 20)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    async fn claimed_job(store: &MemoryStore) -> RecordingTask {
        let key = JobKey::new(JobKind::OneOff, "cam1", 0);
        let end = start() + chrono::Duration::hours(1);
        let job = Job {
            name: "cam1".into(),
            comment: String::new(),
            rtsp_url: "rtsp://cam1".into(),
            path: PathBuf::from("unused"),
            fpm: None,
            status: JobStatus::InProgress,
            with_audio: false,
            segment_minutes: 30,
            schedule: Schedule::OneOff {
                date_from: start(),
                date_to: end,
            },
        };
        store.set(&key, &job).await.unwrap();
        assert!(store.register_task(&key).await.unwrap());
        RecordingTask {
            key,
            uri: job.rtsp_url,
            output_dir: job.path,
            window: Window { start: start(), end },
            segment: chrono::Duration::minutes(30),
            target_fps: None,
            with_audio: false,
        }
    }

    fn launcher(store: MemoryStore, factory: Fixed) -> TaskLauncher<MemoryStore, EventHub> {
        TaskLauncher::new(
            store,
            EventHub::new(),
            Arc::new(MonotonicClock::starting_at(start())),
            Arc::new(factory),
            WorkerSettings {
                reconnect_delay: Duration::from_secs(5),
                extension: "ckf".into(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn a_panicking_worker_releases_its_job() {
        let store = MemoryStore::new();
        let task = claimed_job(&store).await;
        let key = task.key.clone();
        let launcher = launcher(store.clone(), Fixed(exploding));

        launcher.launch(task);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.is_task_running(&key).await.unwrap());

        launcher.tracker.close();
        launcher.tracker.wait().await;

        assert!(!store.is_task_running(&key).await.unwrap());
        let job = store.get(&key).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_requeues_running_jobs() {
        let store = MemoryStore::new();
        let task = claimed_job(&store).await;
        let key = task.key.clone();
        let launcher = launcher(store.clone(), Fixed(offline));

        launcher.launch(task);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(launcher.active(), 2);
        launcher.shutdown().await;

        assert_eq!(launcher.active(), 0);
        assert!(!store.is_task_running(&key).await.unwrap());
        let job = store.get(&key).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn a_crashing_job_is_not_respawned_back_to_back() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let key = JobKey::new(JobKind::OneOff, "cam1", 0);
        let job = Job {
            name: "cam1".into(),
            comment: String::new(),
            rtsp_url: "rtsp://cam1".into(),
            path: dir.path().to_path_buf(),
            fpm: None,
            status: JobStatus::Queued,
            with_audio: false,
            segment_minutes: 30,
            schedule: Schedule::OneOff {
                date_from: start() - chrono::Duration::hours(1),
                date_to: start() + chrono::Duration::hours(1),
            },
        };
        store.set(&key, &job).await.unwrap();

        let spawned = Arc::new(AtomicUsize::new(0));
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::starting_at(start()));
        let launcher = Arc::new(TaskLauncher::new(
            store.clone(),
            EventHub::new(),
            clock.clone(),
            Arc::new(Crashing(spawned.clone())),
            WorkerSettings {
                reconnect_delay: Duration::from_secs(5),
                extension: "ckf".into(),
            },
        ));
        let scheduler = Scheduler::new(
            store.clone(),
            launcher.clone(),
            clock,
            SchedulerSettings {
                scan_interval: Duration::from_secs(1),
                default_segment_minutes: 30,
            },
        );

        let cancel = CancellationToken::new();
        let running = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        running.await.unwrap().unwrap();
        launcher.shutdown().await;

        // One respawn per reconnect delay plus scan interval at most.
        let spawned = spawned.load(Ordering::SeqCst);
        assert!((3..=7).contains(&spawned), "spawned {spawned} workers");
        assert!(!store.is_task_running(&key).await.unwrap());
    }
}
