use crate::domain::media::{Frame, StreamInfo};
use crate::error::SegmentError;
use async_trait::async_trait;
use std::path::Path;

/// A media file format frames can be written to and read back from.
#[async_trait]
pub trait MediaContainer: Send + Sync {
    /// Reads every complete frame of an existing file, in order.
    async fn read_frames(&self, path: &Path) -> Result<(StreamInfo, Vec<Frame>), SegmentError>;

    /// Creates (or truncates) `path` for writing.
    async fn create(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>, SegmentError>;
}

/// An open output file.
#[async_trait]
pub trait FrameSink: Send {
    async fn write(&mut self, frame: &Frame) -> Result<(), SegmentError>;

    /// Flushes and closes the file. It is complete once this returns.
    async fn finish(self: Box<Self>) -> Result<(), SegmentError>;
}
