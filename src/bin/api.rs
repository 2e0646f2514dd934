//! API Binary
//!
//! HTTP surface for submitting, querying and deleting recording jobs.

use camkeeper::adapters::local::{http, RedisPool};
use camkeeper::application::submission::Submission;
use camkeeper::config::Settings;
use camkeeper::ports::clock::SystemClock;
use std::sync::Arc;
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

    let submission = Arc::new(Submission::new(
        redis,
        Arc::new(SystemClock),
        settings.default_segment_minutes,
    ));
    let app = http::router(submission);

    let listener = match tokio::net::TcpListener::bind(format!("{}:{}", settings.addr, settings.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    tracing::info!("Listening at {}:{}", settings.addr, settings.port);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
