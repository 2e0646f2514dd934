//! Capture strategies: how one capture cycle fills one segment.
//!
//! A worker runs the same state machine whatever the strategy; the factory
//! picks the strategy once per job when the worker is spawned.

use super::segment_writer::SegmentWriter;
use super::worker::RecordingTask;
use crate::domain::media::frames_per_write;
use crate::error::CaptureError;
use crate::ports::capture::{CaptureConnector, CaptureSource};
use crate::ports::clock::Clock;
use crate::ports::container::MediaContainer;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait CaptureStrategy: Send {
    /// Makes sure the source is reachable. Cheap when already connected.
    async fn connect(&mut self) -> Result<(), CaptureError>;

    /// Records into `path` until `until`, or until `cancel` fires.
    ///
    /// Whatever was recorded is finalised before returning, also on error,
    /// so a retry against the same path continues the file.
    async fn capture(
        &mut self,
        path: &Path,
        until: NaiveDateTime,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> Result<(), CaptureError>;
}

/// Chooses the strategy for a job.
pub trait CaptureFactory: Send + Sync {
    fn create(&self, task: &RecordingTask) -> Box<dyn CaptureStrategy>;
}

/// Pulls decoded frames from a source and writes every n-th one, so the
/// segment approaches the job's target rate.
pub struct FrameCapture {
    uri: String,
    target_fps: Option<f64>,
    connector: Arc<dyn CaptureConnector>,
    container: Arc<dyn MediaContainer>,
    source: Option<Box<dyn CaptureSource>>,
}

impl FrameCapture {
    pub fn new(
        uri: impl Into<String>,
        target_fps: Option<f64>,
        connector: Arc<dyn CaptureConnector>,
        container: Arc<dyn MediaContainer>,
    ) -> Self {
        Self {
            uri: uri.into(),
            target_fps,
            connector,
            container,
            source: None,
        }
    }
}

async fn pump(
    source: &mut dyn CaptureSource,
    writer: &mut SegmentWriter,
    step: usize,
    until: NaiveDateTime,
    clock: &dyn Clock,
    cancel: &CancellationToken,
) -> Result<(), CaptureError> {
    while clock.now() < until {
        let mut latest = None;
        for _ in 0..step {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = source.next_frame() => next?,
            };
            match next {
                Some(frame) => latest = Some(frame),
                None => return Err(CaptureError::EndOfStream),
            }
        }
        if let Some(frame) = latest {
            writer.write(&frame).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl CaptureStrategy for FrameCapture {
    async fn connect(&mut self) -> Result<(), CaptureError> {
        if self.source.is_none() {
            let source = self.connector.connect(&self.uri).await?;
            tracing::info!(uri = %self.uri, info = ?source.info(), "connected to camera");
            self.source = Some(source);
        }
        Ok(())
    }

    async fn capture(
        &mut self,
        path: &Path,
        until: NaiveDateTime,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> Result<(), CaptureError> {
        let source = self
            .source
            .as_deref_mut()
            .ok_or_else(|| CaptureError::Connect {
                uri: self.uri.clone(),
                reason: "not connected".to_string(),
            })?;
        let info = source.info();
        let step = frames_per_write(info.fps, self.target_fps);

        let outcome = match SegmentWriter::open(self.container.as_ref(), path, info).await {
            Ok(mut writer) => {
                let pumped = pump(source, &mut writer, step, until, clock, cancel).await;
                let released = writer.release().await;
                pumped.and(released.map(drop).map_err(CaptureError::from))
            }
            Err(e) => Err(e.into()),
        };

        if outcome.is_err() {
            // Frames buffered while the worker backs off are stale; the next
            // cycle reconnects.
            self.source = None;
        }
        outcome
    }
}
