//! Configuration loaded from the environment (and an optional `.env` file).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Which container format frame segments are written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// Encoded through the ffmpeg CLI.
    Ffmpeg,
    /// Uncompressed frame files, readable without ffmpeg.
    Raw,
}

impl FromStr for ContainerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(ContainerKind::Ffmpeg),
            "raw" => Ok(ContainerKind::Raw),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Redis connection URL
    pub redis_url: String,
    /// Pause between scheduler scans
    pub scan_interval: Duration,
    /// Fixed backoff after a failed capture cycle
    pub reconnect_delay: Duration,
    /// Segment length for jobs that do not set one
    pub default_segment_minutes: u32,
    /// Segment file extension, without the dot
    pub video_extension: String,
    /// Pub/sub channel carrying finished segment paths
    pub notify_channel: String,
    /// Longest wait for a single frame before the cycle counts as failed
    pub frame_timeout: Duration,
    pub container: ContainerKind,
    pub ffmpeg_bin: String,
    pub video_codec: String,
    /// Video codec of audio+video recordings
    pub recorder_codec: String,
    /// Local prefix stripped from notified paths before upload
    pub upload_local_root: PathBuf,
    /// Remote prefix prepended to uploaded paths
    pub upload_remote_root: String,
    /// Mounted directory, or bucket name with the `s3` feature
    pub upload_target: String,
    /// Attempts per upload for transient failures
    pub upload_attempts: u32,
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Self {
            redis_url: var_or("REDIS_URL", "redis://127.0.0.1/"),
            scan_interval: Duration::from_secs(parse_or("SCAN_INTERVAL_SECONDS", 10)?),
            reconnect_delay: Duration::from_secs(parse_or("RECONNECT_DELAY_SECONDS", 5)?),
            default_segment_minutes: parse_or("DEFAULT_SEGMENT_MINUTES", 30)?,
            video_extension: var_or("VIDEO_EXTENSION", "mkv"),
            notify_channel: var_or("NOTIFY_CHANNEL", "videos"),
            frame_timeout: Duration::from_secs(parse_or("FRAME_TIMEOUT_SECONDS", 10)?),
            container: parse_or("CONTAINER", ContainerKind::Ffmpeg)?,
            ffmpeg_bin: var_or("FFMPEG_BIN", "ffmpeg"),
            video_codec: var_or("VIDEO_CODEC", "libx264"),
            recorder_codec: var_or("RECORDER_VIDEO_CODEC", "copy"),
            upload_local_root: PathBuf::from(var_or("UPLOAD_LOCAL_ROOT", ".")),
            upload_remote_root: var_or("UPLOAD_REMOTE_ROOT", ""),
            upload_target: var_or("UPLOAD_TARGET", "./remote"),
            upload_attempts: parse_or("UPLOAD_ATTEMPTS", 3)?,
            addr: var_or("ADDR", "127.0.0.1"),
            port: var_or("PORT", "8000"),
        })
    }
}

fn var_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| String::from(default))
}

fn parse_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError { var, value }),
        Err(_) => Ok(default),
    }
}
