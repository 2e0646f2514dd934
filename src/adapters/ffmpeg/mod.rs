//! ffmpeg adapters.
//!
//! Stream parameters are probed with `ffmpeg-next`; decoding, encoding and
//! the audio recorder run the ffmpeg CLI as a child process.

mod capture;
mod container;
mod factory;
mod probe;
mod recorder;

pub use capture::FfmpegConnector;
pub use container::FfmpegContainer;
pub use factory::FfmpegCaptureFactory;
pub use recorder::FfmpegRecorder;

use std::time::Duration;

/// Settings shared by every ffmpeg adapter.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// ffmpeg executable
    pub bin: String,
    /// Video codec for encoded segments
    pub codec: String,
    /// Video codec of audio recordings; `copy` keeps the camera's stream
    pub recorder_codec: String,
    /// Longest wait for one decoded frame
    pub frame_timeout: Duration,
}

/// Pixel format frames travel in between ffmpeg and the application.
const PIX_FMT: &str = "bgr24";
