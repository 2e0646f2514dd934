//! Scheduler Binary
//!
//! Polls the job store, starts a recording worker for every due job and
//! supervises the workers. Ctrl-C lets every worker finish its current
//! segment before the process exits.
//!
//! Environment Variables (see `Settings`):
//! - REDIS_URL, NOTIFY_CHANNEL: job store and segment notifications
//! - SCAN_INTERVAL_SECONDS, RECONNECT_DELAY_SECONDS, DEFAULT_SEGMENT_MINUTES
//! - CONTAINER, FFMPEG_BIN, VIDEO_CODEC, VIDEO_EXTENSION, FRAME_TIMEOUT_SECONDS

use camkeeper::adapters::ffmpeg::{
    FfmpegCaptureFactory, FfmpegConfig, FfmpegConnector, FfmpegContainer,
};
use camkeeper::adapters::local::{FrameFileContainer, RedisPool};
use camkeeper::application::launcher::TaskLauncher;
use camkeeper::application::scheduler::{Scheduler, SchedulerSettings};
use camkeeper::application::worker::WorkerSettings;
use camkeeper::config::{ContainerKind, Settings};
use camkeeper::ports::clock::{Clock, SystemClock};
use camkeeper::ports::container::MediaContainer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    // 1. Adapters
    let redis = match RedisPool::new(&settings.redis_url, &settings.notify_channel) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to create Redis pool");
            std::process::exit(1);
        }
    };
    if let Err(e) = redis.ping().await {
        tracing::error!(error = %e, "job store unreachable");
        std::process::exit(1);
    }

    let ffmpeg = FfmpegConfig {
        bin: settings.ffmpeg_bin.clone(),
        codec: settings.video_codec.clone(),
        recorder_codec: settings.recorder_codec.clone(),
        frame_timeout: settings.frame_timeout,
    };
    let container: Arc<dyn MediaContainer> = match settings.container {
        ContainerKind::Ffmpeg => Arc::new(FfmpegContainer::new(ffmpeg.clone())),
        ContainerKind::Raw => Arc::new(FrameFileContainer::new()),
    };
    let factory = Arc::new(FfmpegCaptureFactory::new(
        Arc::new(FfmpegConnector::new(ffmpeg.clone())),
        container,
        ffmpeg,
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 2. Application services
    let launcher = Arc::new(TaskLauncher::new(
        redis.clone(),
        redis.clone(),
        clock.clone(),
        factory,
        WorkerSettings {
            reconnect_delay: settings.reconnect_delay,
            extension: settings.video_extension.clone(),
        },
    ));
    let scheduler = Scheduler::new(
        redis,
        launcher.clone(),
        clock,
        SchedulerSettings {
            scan_interval: settings.scan_interval,
            default_segment_minutes: settings.default_segment_minutes,
        },
    );

    if let Err(e) = scheduler.startup_sweep().await {
        tracing::error!(error = %e, "startup sweep failed");
        std::process::exit(1);
    }

    // 3. Shutdown on Ctrl-C
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                stop.cancel();
            }
            Err(e) => tracing::error!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    // 4. Run
    let result = scheduler.run(cancel).await;
    launcher.shutdown().await;
    if let Err(e) = result {
        tracing::error!(error = %e, "job store unavailable, exiting");
        std::process::exit(1);
    }
}
