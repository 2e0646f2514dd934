use super::probe::probe;
use super::{FfmpegConfig, PIX_FMT};
use crate::domain::media::{Frame, StreamInfo};
use crate::error::CaptureError;
use crate::ports::capture::{CaptureConnector, CaptureSource};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// Opens RTSP cameras by piping raw decoded frames out of ffmpeg.
pub struct FfmpegConnector {
    config: FfmpegConfig,
}

impl FfmpegConnector {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

fn decoder_args(uri: &str) -> Vec<String> {
    [
        "-loglevel", "error", "-rtsp_transport", "tcp", "-i", uri, "-an", "-f", "rawvideo",
        "-pix_fmt", PIX_FMT, "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[async_trait]
impl CaptureConnector for FfmpegConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let failed = |reason: String| CaptureError::Connect {
            uri: uri.to_string(),
            reason,
        };
        let info = probe(uri).await.map_err(failed)?;

        let mut child = Command::new(&self.config.bin)
            .args(decoder_args(uri))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| failed("decoder has no output pipe".to_string()))?;

        Ok(Box::new(FfmpegSource {
            info,
            _child: child,
            stdout,
            frame_timeout: self.config.frame_timeout,
        }))
    }
}

/// A running decoder. Dropping it kills the child process.
struct FfmpegSource {
    info: StreamInfo,
    _child: Child,
    stdout: ChildStdout,
    frame_timeout: Duration,
}

#[async_trait]
impl CaptureSource for FfmpegSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut data = vec![0u8; self.info.frame_size()];
        match tokio::time::timeout(self.frame_timeout, self.stdout.read_exact(&mut data)).await {
            Err(_) => Err(CaptureError::Timeout(self.frame_timeout)),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(_)) => Ok(Some(Frame::new(data))),
        }
    }
}
