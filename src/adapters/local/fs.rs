use crate::error::UploadError;
use crate::ports::storage::RemoteStorage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// `RemoteStorage` over a directory, typically a mounted network share.
#[derive(Clone, Debug)]
pub struct MountedStorage {
    root: PathBuf,
}

impl MountedStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, remote_path: &str) -> Result<PathBuf, UploadError> {
        let mut path = self.root.clone();
        for part in remote_path.split('/').filter(|p| !p.is_empty()) {
            if part == ".." {
                return Err(UploadError::Permission(format!(
                    "{} escapes the storage root",
                    remote_path
                )));
            }
            path.push(part);
        }
        Ok(path)
    }
}

#[async_trait]
impl RemoteStorage for MountedStorage {
    async fn exists(&self, remote_path: &str) -> Result<bool, UploadError> {
        Ok(tokio::fs::try_exists(self.resolve(remote_path)?).await?)
    }

    async fn mkdir(&self, remote_path: &str) -> Result<(), UploadError> {
        match tokio::fs::create_dir(self.resolve(remote_path)?).await {
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            other => Ok(other?),
        }
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        let dest = self.resolve(remote_path)?;
        if !overwrite && tokio::fs::try_exists(&dest).await? {
            return Err(UploadError::Conflict(remote_path.to_string()));
        }
        // Copy under a hidden name first so a half-copied file is never visible.
        let partial = dest.with_file_name(format!(
            ".{}.part",
            dest.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        tokio::fs::copy(local_path, &partial).await?;
        tokio::fs::rename(&partial, &dest).await?;
        Ok(())
    }

    async fn rename(&self, remote_path: &str, new_name: &str) -> Result<(), UploadError> {
        let from = self.resolve(remote_path)?;
        let to = from.with_file_name(new_name);
        if tokio::fs::try_exists(&to).await? {
            return Err(UploadError::Conflict(new_name.to_string()));
        }
        tokio::fs::rename(from, to).await?;
        Ok(())
    }
}
