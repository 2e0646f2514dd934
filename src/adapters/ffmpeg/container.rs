use super::probe::probe;
use super::{FfmpegConfig, PIX_FMT};
use crate::domain::media::{Frame, StreamInfo};
use crate::error::SegmentError;
use crate::ports::container::{FrameSink, MediaContainer};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

/// Encoded video segments written and read back through ffmpeg.
pub struct FfmpegContainer {
    config: FfmpegConfig,
}

impl FfmpegContainer {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

fn encoder_args(info: StreamInfo, codec: &str, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", PIX_FMT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend([
        "-s".to_string(),
        format!("{}x{}", info.width, info.height),
        "-r".to_string(),
        info.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        codec.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Splits decoder output into whole frames; a short tail is dropped.
fn split_frames(raw: &[u8], frame_size: usize) -> Vec<Frame> {
    if frame_size == 0 {
        return Vec::new();
    }
    raw.chunks_exact(frame_size)
        .map(|chunk| Frame::new(chunk.to_vec()))
        .collect()
}

#[async_trait]
impl MediaContainer for FfmpegContainer {
    async fn read_frames(&self, path: &Path) -> Result<(StreamInfo, Vec<Frame>), SegmentError> {
        let format_error = |reason: String| SegmentError::Format {
            path: path.to_path_buf(),
            reason,
        };
        let info = probe(&path.to_string_lossy()).await.map_err(format_error)?;

        let output = Command::new(&self.config.bin)
            .args(["-loglevel", "error", "-i"])
            .arg(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", PIX_FMT, "-"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SegmentError::io(path, e))?;
        if !output.status.success() {
            return Err(format_error(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        let frames = split_frames(&output.stdout, info.frame_size());
        Ok((info, frames))
    }

    async fn create(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>, SegmentError> {
        let mut child = Command::new(&self.config.bin)
            .args(encoder_args(info, &self.config.codec, path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SegmentError::Encoder(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SegmentError::Encoder("encoder has no input pipe".to_string()))?;

        Ok(Box::new(FfmpegSink {
            path: path.to_path_buf(),
            frame_size: info.frame_size(),
            child,
            stdin,
        }))
    }
}

struct FfmpegSink {
    path: PathBuf,
    frame_size: usize,
    child: Child,
    stdin: ChildStdin,
}

#[async_trait]
impl FrameSink for FfmpegSink {
    async fn write(&mut self, frame: &Frame) -> Result<(), SegmentError> {
        if frame.data.len() != self.frame_size {
            return Err(SegmentError::Format {
                path: self.path.clone(),
                reason: format!("frame of {} bytes, expected {}", frame.data.len(), self.frame_size),
            });
        }
        self.stdin
            .write_all(&frame.data)
            .await
            .map_err(|e| SegmentError::io(&self.path, e))
    }

    async fn finish(self: Box<Self>) -> Result<(), SegmentError> {
        let FfmpegSink {
            path,
            mut child,
            mut stdin,
            ..
        } = *self;
        stdin.shutdown().await.map_err(|e| SegmentError::io(&path, e))?;
        // Closing stdin is the encoder's end of input.
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SegmentError::io(&path, e))?;
        if !output.status.success() {
            return Err(SegmentError::Encoder(format!(
                "{} for {}: {}",
                output.status,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        tracing::debug!(path = %path.display(), "encoder finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_reads_raw_frames_at_the_stream_parameters() {
        let info = StreamInfo {
            fps: 12.5,
            width: 640,
            height: 360,
        };
        let args = encoder_args(info, "libx264", Path::new("out/seg.mkv"));
        let joined = args.join(" ");
        assert!(joined.contains("-s 640x360 -r 12.5 -i -"));
        assert!(joined.contains("-c:v libx264"));
        assert_eq!(args.last().map(String::as_str), Some("out/seg.mkv"));
    }

    #[test]
    fn partial_trailing_frames_are_dropped() {
        let frames = split_frames(&[1, 1, 1, 2, 2, 2, 3], 3);
        assert_eq!(frames, vec![Frame::new(vec![1; 3]), Frame::new(vec![2; 3])]);
        assert!(split_frames(&[1, 2], 0).is_empty());
    }
}
