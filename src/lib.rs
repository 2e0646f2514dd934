//! Camkeeper - RTSP camera recording scheduler
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, schedules, frames)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Scheduler, workers, upload dispatcher, submission
//! - config: Environment configuration
//!
//! # Features
//! - `redis`: Redis job store and pub/sub notifications (default)
//! - `ffmpeg`: Camera capture, encoded segments and audio recording through ffmpeg
//! - `s3`: S3 remote storage for the uploader
//! - `api`: HTTP submission API
//! - `full`: All features

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for convenience
pub use config::Settings;
pub use error::{CaptureError, SegmentError, StoreError, SubmissionError, UploadError};

#[cfg(feature = "redis")]
pub use adapters::local::RedisPool;
