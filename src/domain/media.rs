use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// One decoded picture, stored as packed BGR24 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Stream parameters discovered on connection and stored in segment headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    /// Size in bytes of one BGR24 frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// How many source frames to advance per written frame so the output
/// approaches `target_fps`. Never below one, so the writer never upsamples.
pub fn frames_per_write(native_fps: f64, target_fps: Option<f64>) -> usize {
    match target_fps {
        Some(target) if target > 0.0 && native_fps > 0.0 => {
            ((native_fps / target).floor() as usize).max(1)
        }
        _ => 1,
    }
}

/// Segment file path for a segment starting at `start`.
pub fn segment_path(dir: &Path, start: NaiveDateTime, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", start.format("%Y-%m-%dT%H_%M_%S"), extension))
}

/// Sibling path used while rewriting `path`: `dir/name.mkv` -> `dir/name_.mkv`.
pub fn staging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_.{}", stem, ext.to_string_lossy()),
        None => format!("{}_", stem),
    };
    path.with_file_name(name)
}
