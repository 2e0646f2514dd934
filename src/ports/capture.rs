use crate::domain::media::{Frame, StreamInfo};
use crate::error::CaptureError;
use async_trait::async_trait;

/// Opens camera streams.
#[async_trait]
pub trait CaptureConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

/// A live camera stream. Dropping it releases the connection.
#[async_trait]
pub trait CaptureSource: Send {
    fn info(&self) -> StreamInfo;

    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}
