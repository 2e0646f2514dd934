use crate::domain::media::{staging_path, Frame, StreamInfo};
use crate::error::SegmentError;
use crate::ports::container::{FrameSink, MediaContainer};
use std::path::{Path, PathBuf};

const CORRUPT_EXTENSION: &str = "corrupt";

/// Owns one open segment file.
///
/// If a file already exists at the target path (left by an interrupted
/// attempt), its frames are replayed into a staging sibling first and the
/// sibling replaces the original on `release`, so the finished file holds
/// the old frames followed by every frame written since `open`. An existing
/// file that cannot be read back is moved to `<stem>.corrupt` and recording
/// starts over in a fresh file.
pub struct SegmentWriter {
    path: PathBuf,
    staging: Option<PathBuf>,
    sink: Box<dyn FrameSink>,
    info: StreamInfo,
    frames: u64,
}

impl SegmentWriter {
    pub async fn open(
        container: &dyn MediaContainer,
        path: &Path,
        info: StreamInfo,
    ) -> Result<Self, SegmentError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| SegmentError::io(path, e))?;
        if !exists {
            return Self::fresh(container, path, info).await;
        }

        // Continue at the parameters the existing file was written with.
        let (existing, frames) = match container.read_frames(path).await {
            Ok(read) => read,
            Err(SegmentError::Format { reason, .. }) => {
                let aside = path.with_extension(CORRUPT_EXTENSION);
                tracing::warn!(
                    path = %path.display(),
                    aside = %aside.display(),
                    reason = %reason,
                    "existing segment is unreadable, starting over"
                );
                tokio::fs::rename(path, &aside)
                    .await
                    .map_err(|e| SegmentError::io(path, e))?;
                return Self::fresh(container, path, info).await;
            }
            Err(e) => return Err(e),
        };
        let staging = staging_path(path);
        let mut sink = container.create(&staging, existing).await?;
        for frame in &frames {
            sink.write(frame).await?;
        }
        tracing::info!(
            path = %path.display(),
            frames = frames.len(),
            "resuming existing segment"
        );
        Ok(Self {
            path: path.to_path_buf(),
            staging: Some(staging),
            sink,
            info: existing,
            frames: frames.len() as u64,
        })
    }

    async fn fresh(
        container: &dyn MediaContainer,
        path: &Path,
        info: StreamInfo,
    ) -> Result<Self, SegmentError> {
        let sink = container.create(path, info).await?;
        Ok(Self {
            path: path.to_path_buf(),
            staging: None,
            sink,
            info,
            frames: 0,
        })
    }

    pub async fn write(&mut self, frame: &Frame) -> Result<(), SegmentError> {
        self.sink.write(frame).await?;
        self.frames += 1;
        Ok(())
    }

    /// Parameters the file is being written at.
    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Frames in the file so far, including any resumed prefix.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Finalises the file and returns its path.
    pub async fn release(self) -> Result<PathBuf, SegmentError> {
        self.sink.finish().await?;
        if let Some(staging) = self.staging {
            tokio::fs::rename(&staging, &self.path)
                .await
                .map_err(|e| SegmentError::io(&self.path, e))?;
        }
        tracing::debug!(path = %self.path.display(), frames = self.frames, "segment released");
        Ok(self.path)
    }
}
