//! Error types, one enum per concern.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),
    #[cfg(feature = "redis")]
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("create pool error: {0}")]
    CreatePool(String),
    #[error("serialization error in {key}: {source}")]
    Serialization {
        key: String,
        source: serde_json::Error,
    },
    #[error("malformed key {0}")]
    MalformedKey(String),
}

impl StoreError {
    /// Whether the store itself is unreachable, as opposed to one bad record.
    pub fn is_unavailable(&self) -> bool {
        !matches!(
            self,
            StoreError::Serialization { .. } | StoreError::MalformedKey(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path} is not a readable segment: {reason}")]
    Format { path: PathBuf, reason: String },
    #[error("encoder failed: {0}")]
    Encoder(String),
}

impl SegmentError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SegmentError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Transient capture failures. All of them are retried by the worker.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot connect to {uri}: {reason}")]
    Connect { uri: String, reason: String },
    #[error("stream ended")]
    EndOfStream,
    #[error("no frame within {0:?}")]
    Timeout(std::time::Duration),
    #[error("recorder exited with {0}")]
    Process(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Segment(#[from] SegmentError),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("remote object already exists: {0}")]
    Conflict(String),
    #[error("remote object is locked: {0}")]
    Locked(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("transient upload failure: {0}")]
    Transient(String),
    #[error("upload failed: {0}")]
    Fatal(String),
}

impl UploadError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Transient(_))
    }
}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AlreadyExists => UploadError::Conflict(err.to_string()),
            io::ErrorKind::PermissionDenied => UploadError::Permission(err.to_string()),
            io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => UploadError::Transient(err.to_string()),
            _ => UploadError::Fatal(err.to_string()),
        }
    }
}

/// Rejected job submissions.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid submission: {0}")]
    Invalid(String),
    #[error("a job named {0} already exists")]
    Duplicate(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {var}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}
