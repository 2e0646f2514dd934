//! Uncompressed frame files.
//!
//! Layout: the magic `CKF1`, then width and height as little-endian `u32`
//! and the frame rate as little-endian `f64`, then one record per frame: a
//! little-endian `u32` byte length followed by the frame bytes. A record cut
//! short by a crash is ignored on read, so everything before it survives.

use crate::domain::media::{Frame, StreamInfo};
use crate::error::SegmentError;
use crate::ports::container::{FrameSink, MediaContainer};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

const MAGIC: &[u8; 4] = b"CKF1";
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameFileContainer;

impl FrameFileContainer {
    pub fn new() -> Self {
        Self
    }
}

fn parse(path: &Path, data: &[u8]) -> Result<(StreamInfo, Vec<Frame>), SegmentError> {
    let format_error = |reason: &str| SegmentError::Format {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if data.len() < HEADER_LEN || &data[..4] != MAGIC {
        return Err(format_error("missing frame file header"));
    }
    let u32_at = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
    let mut fps = [0u8; 8];
    fps.copy_from_slice(&data[12..20]);
    let info = StreamInfo {
        width: u32_at(4),
        height: u32_at(8),
        fps: f64::from_le_bytes(fps),
    };

    let mut frames = Vec::new();
    let mut offset = HEADER_LEN;
    while offset + 4 <= data.len() {
        let len = u32_at(offset) as usize;
        let start = offset + 4;
        if start + len > data.len() {
            tracing::warn!(path = %path.display(), frames = frames.len(), "ignoring truncated trailing frame");
            break;
        }
        frames.push(Frame::new(data[start..start + len].to_vec()));
        offset = start + len;
    }
    Ok((info, frames))
}

#[async_trait]
impl MediaContainer for FrameFileContainer {
    async fn read_frames(&self, path: &Path) -> Result<(StreamInfo, Vec<Frame>), SegmentError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| SegmentError::io(path, e))?;
        parse(path, &data)
    }

    async fn create(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>, SegmentError> {
        let file = File::create(path)
            .await
            .map_err(|e| SegmentError::io(path, e))?;
        let mut out = BufWriter::new(file);
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&info.width.to_le_bytes());
        header.extend_from_slice(&info.height.to_le_bytes());
        header.extend_from_slice(&info.fps.to_le_bytes());
        out.write_all(&header)
            .await
            .map_err(|e| SegmentError::io(path, e))?;
        Ok(Box::new(FrameFileSink {
            path: path.to_path_buf(),
            out,
        }))
    }
}

struct FrameFileSink {
    path: PathBuf,
    out: BufWriter<File>,
}

#[async_trait]
impl FrameSink for FrameFileSink {
    async fn write(&mut self, frame: &Frame) -> Result<(), SegmentError> {
        let len = u32::try_from(frame.data.len()).map_err(|_| SegmentError::Format {
            path: self.path.clone(),
            reason: format!("frame of {} bytes is too large", frame.data.len()),
        })?;
        self.out
            .write_all(&len.to_le_bytes())
            .await
            .map_err(|e| SegmentError::io(&self.path, e))?;
        self.out
            .write_all(&frame.data)
            .await
            .map_err(|e| SegmentError::io(&self.path, e))
    }

    async fn finish(self: Box<Self>) -> Result<(), SegmentError> {
        let FrameFileSink { path, mut out } = *self;
        out.flush().await.map_err(|e| SegmentError::io(&path, e))?;
        out.get_ref()
            .sync_all()
            .await
            .map_err(|e| SegmentError::io(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn info() -> StreamInfo {
        StreamInfo {
            fps: 25.0,
            width: 2,
            height: 1,
        }
    }

    #[tokio::test]
    async fn written_frames_read_back_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ckf");
        let container = FrameFileContainer::new();

        let mut sink = container.create(&path, info()).await.unwrap();
        for i in 0..3u8 {
            sink.write(&Frame::new(vec![i; 6])).await.unwrap();
        }
        sink.finish().await.unwrap();

        let (read_info, frames) = container.read_frames(&path).await.unwrap();
        assert_eq!(read_info, info());
        assert_eq!(frames, (0..3u8).map(|i| Frame::new(vec![i; 6])).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn truncated_trailing_frame_is_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crashed.ckf");
        let container = FrameFileContainer::new();

        let mut sink = container.create(&path, info()).await.unwrap();
        sink.write(&Frame::new(vec![1; 6])).await.unwrap();
        sink.write(&Frame::new(vec![2; 6])).await.unwrap();
        sink.finish().await.unwrap();

        let mut data = std::fs::read(&path).unwrap();
        data.truncate(data.len() - 3);
        std::fs::write(&path, data).unwrap();

        let (_, frames) = container.read_frames(&path).await.unwrap();
        assert_eq!(frames, vec![Frame::new(vec![1; 6])]);
    }

    #[tokio::test]
    async fn foreign_files_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello, not a segment").unwrap();

        let err = FrameFileContainer::new().read_frames(&path).await.unwrap_err();
        assert!(matches!(err, SegmentError::Format { .. }));
    }
}
