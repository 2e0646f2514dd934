//! Hands finished segments over to remote storage.

use crate::domain::jobs::Notification;
use crate::error::UploadError;
use crate::ports::storage::RemoteStorage;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

const TMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Stripped from notified paths to get the remote path.
    pub local_root: PathBuf,
    /// Prepended to remote paths.
    pub remote_root: String,
    pub attempts: u32,
    pub retry_delay: Duration,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded(String),
    AlreadyUploaded,
    SourceMissing,
    Failed(UploadError),
}

/// Consumes segment notifications and uploads each file.
///
/// The local file is renamed to `.tmp` before upload and the remote copy
/// is written under a `.tmp` name, then renamed to its final name, so
/// neither side ever shows a half-transferred file under the real name.
/// Failures are logged and dropped; the local `.tmp` stays behind.
pub struct UploadDispatcher<R> {
    storage: R,
    settings: UploadSettings,
}

impl<R: RemoteStorage> UploadDispatcher<R> {
    pub fn new(storage: R, settings: UploadSettings) -> Self {
        Self { storage, settings }
    }

    pub async fn run(&self, mut notifications: BoxStream<'static, Notification>) {
        tracing::info!("upload dispatcher started");
        while let Some(notification) = notifications.next().await {
            self.handle(&notification.path).await;
        }
        tracing::warn!("notification stream closed");
    }

    pub async fn handle(&self, path: &Path) -> UploadOutcome {
        let Some(source) = claim_local(path).await else {
            tracing::warn!(path = %path.display(), "segment file missing, dropping notification");
            return UploadOutcome::SourceMissing;
        };
        let remote = self.remote_path(path);

        match self.push(&source, &remote).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match e {
                    UploadError::Conflict(_) | UploadError::Locked(_) | UploadError::Permission(_) => {
                        tracing::warn!(path = %source.display(), remote, error = %e, "upload rejected")
                    }
                    _ => tracing::error!(path = %source.display(), remote, error = %e, "upload failed"),
                }
                UploadOutcome::Failed(e)
            }
        }
    }

    async fn push(&self, source: &Path, remote: &str) -> Result<UploadOutcome, UploadError> {
        if self.storage.exists(remote).await? {
            tracing::info!(remote, "already uploaded");
            return Ok(UploadOutcome::AlreadyUploaded);
        }

        let staged = with_tmp_extension(remote);
        if self.storage.exists(&staged).await? {
            tracing::info!(remote = %staged, "remote copy present, finishing");
        } else {
            self.mkdir_recursive(remote).await?;
            self.upload_with_retry(source, &staged).await?;
        }

        let name = remote.rsplit('/').next().unwrap_or(remote);
        self.storage.rename(&staged, name).await?;
        tracing::info!(path = %source.display(), remote, "uploaded");
        Ok(UploadOutcome::Uploaded(remote.to_string()))
    }

    /// Creates every missing parent directory of `remote`, outermost first.
    async fn mkdir_recursive(&self, remote: &str) -> Result<(), UploadError> {
        let Some((parent, _)) = remote.rsplit_once('/') else {
            return Ok(());
        };
        let mut dir = String::new();
        for part in parent.split('/').filter(|p| !p.is_empty()) {
            if !dir.is_empty() {
                dir.push('/');
            }
            dir.push_str(part);
            if !self.storage.exists(&dir).await? {
                self.storage.mkdir(&dir).await?;
            }
        }
        Ok(())
    }

    async fn upload_with_retry(&self, source: &Path, remote: &str) -> Result<(), UploadError> {
        let attempts = self.settings.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.storage.upload(source, remote, false).await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(remote, attempt, error = %e, "upload interrupted, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    /// `/`-separated remote path for a local segment path.
    pub fn remote_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.settings.local_root).unwrap_or(path);
        let root = self.settings.remote_root.trim_matches('/');
        let parts = relative.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        });
        std::iter::once(root.to_string())
            .filter(|r| !r.is_empty())
            .chain(parts)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Renames the segment to its `.tmp` sibling and returns that path.
/// A `.tmp` left by an earlier delivery is reused.
async fn claim_local(path: &Path) -> Option<PathBuf> {
    let staged = path.with_extension(TMP_EXTENSION);
    if tokio::fs::try_exists(&staged).await.unwrap_or(false) {
        return Some(staged);
    }
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return None;
    }
    match tokio::fs::rename(path, &staged).await {
        Ok(()) => Some(staged),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot stage segment for upload");
            None
        }
    }
}

fn with_tmp_extension(remote: &str) -> String {
    let name_start = remote.rfind('/').map_or(0, |i| i + 1);
    match remote[name_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{}", &remote[..name_start + dot], TMP_EXTENSION),
        _ => format!("{}.{}", remote, TMP_EXTENSION),
    }
}
