use super::probe::probe;
use super::FfmpegConfig;
use crate::application::capture::CaptureStrategy;
use crate::domain::media::staging_path;
use crate::error::CaptureError;
use crate::ports::clock::Clock;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Grace period on top of the segment length before the recorder is killed.
const EXIT_GRACE: Duration = Duration::from_secs(10);

/// Records video and audio with one ffmpeg process per segment.
///
/// A segment file left by an earlier attempt is kept: the new recording
/// goes to a sibling and is joined onto it with the concat demuxer.
pub struct FfmpegRecorder {
    uri: String,
    config: FfmpegConfig,
}

impl FfmpegRecorder {
    pub fn new(uri: impl Into<String>, config: FfmpegConfig) -> Self {
        Self {
            uri: uri.into(),
            config,
        }
    }
}

enum Waited {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

fn recorder_args(uri: &str, seconds: u64, codec: &str, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-rtsp_transport",
        "tcp",
        "-use_wallclock_as_timestamps",
        "1",
        "-i",
        uri,
        "-t",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(seconds.to_string());
    args.extend(["-vcodec", codec, "-acodec", "pcm_s16le"].iter().map(|s| s.to_string()));
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Concat demuxer list joining `parts` in order.
fn concat_list(parts: &[&Path]) -> String {
    parts
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}"))
}

impl FfmpegRecorder {
    async fn stop(child: &mut Child) -> std::io::Result<ExitStatus> {
        // 'q' makes ffmpeg finalise the container before exiting.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(b"q").await;
        }
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                child.kill().await?;
                child.wait().await
            }
        }
    }

    async fn join(&self, path: &Path, part: &Path) -> Result<(), CaptureError> {
        let list = sibling(path, "_concat.txt");
        let joined = sibling(
            path,
            &format!(
                "_joined.{}",
                path.extension().map(|e| e.to_string_lossy()).unwrap_or_default()
            ),
        );
        tokio::fs::write(&list, concat_list(&[path, part])).await?;

        let output = Command::new(&self.config.bin)
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list)
            .args(["-c", "copy"])
            .arg(&joined)
            .stdin(Stdio::null())
            .output()
            .await?;
        let _ = tokio::fs::remove_file(&list).await;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&joined).await;
            return Err(CaptureError::Process(format!(
                "concat exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tokio::fs::rename(&joined, path).await?;
        tokio::fs::remove_file(part).await?;
        tracing::info!(path = %path.display(), "joined resumed recording");
        Ok(())
    }
}

#[async_trait]
impl CaptureStrategy for FfmpegRecorder {
    async fn connect(&mut self) -> Result<(), CaptureError> {
        probe(&self.uri).await.map(|_| ()).map_err(|reason| CaptureError::Connect {
            uri: self.uri.clone(),
            reason,
        })
    }

    async fn capture(
        &mut self,
        path: &Path,
        until: NaiveDateTime,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> Result<(), CaptureError> {
        let seconds = (until - clock.now()).num_seconds().max(1) as u64;
        let resuming = tokio::fs::try_exists(path).await?;
        let target = if resuming {
            staging_path(path)
        } else {
            path.to_path_buf()
        };

        let mut child = Command::new(&self.config.bin)
            .args(recorder_args(&self.uri, seconds, &self.config.recorder_codec, &target))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let limit = Duration::from_secs(seconds) + EXIT_GRACE;
        let waited = tokio::select! {
            status = tokio::time::timeout(limit, child.wait()) => match status {
                Ok(status) => Waited::Exited(status?),
                Err(_) => Waited::TimedOut,
            },
            _ = cancel.cancelled() => Waited::Cancelled,
        };

        let result = match waited {
            Waited::Exited(status) if status.success() => Ok(()),
            Waited::Exited(status) => Err(CaptureError::Process(status.to_string())),
            Waited::TimedOut => {
                child.kill().await?;
                Err(CaptureError::Process(format!("still running after {:?}", limit)))
            }
            Waited::Cancelled => Self::stop(&mut child).await.map(|_| ()).map_err(Into::into),
        };

        // Keep whatever was recorded, also after a failure.
        if resuming && tokio::fs::try_exists(&target).await? {
            self.join(path, &target).await?;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_is_bounded_by_the_segment_length() {
        let args = recorder_args("rtsp://cam/1", 1800, "copy", Path::new("a/seg.mkv"));
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -loglevel error -rtsp_transport tcp"));
        assert!(joined.contains("-use_wallclock_as_timestamps 1 -i rtsp://cam/1 -t 1800"));
        assert!(joined.ends_with("-vcodec copy -acodec pcm_s16le a/seg.mkv"));
    }

    #[test]
    fn concat_lists_escape_quotes() {
        let list = concat_list(&[Path::new("a/seg.mkv"), Path::new("a/it's.mkv")]);
        assert_eq!(list, "file 'a/seg.mkv'\nfile 'a/it'\\''s.mkv'\n");
    }

    #[test]
    fn helper_files_sit_beside_the_segment() {
        assert_eq!(
            sibling(Path::new("cam/2024.mkv"), "_concat.txt"),
            PathBuf::from("cam/2024_concat.txt")
        );
    }
}
