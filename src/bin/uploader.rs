//! Uploader Binary
//!
//! Subscribes to segment notifications and offloads every finished
//! segment to remote storage: a mounted directory, or an S3 bucket when
//! UPLOAD_TARGET is `s3://<bucket>` and the `s3` feature is enabled.

use camkeeper::adapters::local::{MountedStorage, RedisPool};
use camkeeper::application::dispatcher::{UploadDispatcher, UploadSettings};
use camkeeper::config::Settings;
use camkeeper::domain::jobs::Notification;
use camkeeper::ports::notify::NotificationChannel;
use futures::stream::BoxStream;
use std::time::Duration;
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

    let redis = match RedisPool::new(&settings.redis_url, &settings.notify_channel) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to create Redis pool");
            std::process::exit(1);
        }
    };
    let notifications = match redis.subscribe().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "cannot subscribe to notifications");
            std::process::exit(1);
        }
    };

    let upload = UploadSettings {
        local_root: settings.upload_local_root.clone(),
        remote_root: settings.upload_remote_root.clone(),
        attempts: settings.upload_attempts,
        retry_delay: Duration::from_secs(1),
    };
    match settings.upload_target.strip_prefix("s3://") {
        Some(bucket) => run_s3(bucket, upload, notifications).await,
        None => {
            let storage = MountedStorage::new(&settings.upload_target);
            UploadDispatcher::new(storage, upload).run(notifications).await
        }
    }

    // The subscription only ends when the connection drops.
    std::process::exit(1);
}

#[cfg(feature = "s3")]
async fn run_s3(bucket: &str, upload: UploadSettings, notifications: BoxStream<'static, Notification>) {
    use camkeeper::adapters::aws::s3::S3Storage;

    let storage = S3Storage::from_env(bucket.to_string()).await;
    UploadDispatcher::new(storage, upload).run(notifications).await
}

#[cfg(not(feature = "s3"))]
async fn run_s3(bucket: &str, _upload: UploadSettings, _notifications: BoxStream<'static, Notification>) {
    tracing::error!(bucket, "S3 target requested but built without the s3 feature");
}
