use super::{FfmpegConfig, FfmpegRecorder};
use crate::application::capture::{CaptureFactory, CaptureStrategy, FrameCapture};
use crate::application::worker::RecordingTask;
use crate::ports::capture::CaptureConnector;
use crate::ports::container::MediaContainer;
use std::sync::Arc;

/// Audio jobs record through an ffmpeg process per segment, every other
/// job through decoded frames.
pub struct FfmpegCaptureFactory {
    connector: Arc<dyn CaptureConnector>,
    container: Arc<dyn MediaContainer>,
    config: FfmpegConfig,
}

impl FfmpegCaptureFactory {
    pub fn new(
        connector: Arc<dyn CaptureConnector>,
        container: Arc<dyn MediaContainer>,
        config: FfmpegConfig,
    ) -> Self {
        Self {
            connector,
            container,
            config,
        }
    }
}

impl CaptureFactory for FfmpegCaptureFactory {
    fn create(&self, task: &RecordingTask) -> Box<dyn CaptureStrategy> {
        if task.with_audio {
            tracing::debug!(key = %task.key, "recording with audio");
            Box::new(FfmpegRecorder::new(task.uri.clone(), self.config.clone()))
        } else {
            Box::new(FrameCapture::new(
                task.uri.clone(),
                task.target_fps,
                self.connector.clone(),
                self.container.clone(),
            ))
        }
    }
}
