use crate::error::UploadError;
use async_trait::async_trait;
use std::path::Path;

/// Remote storage finished segments are offloaded to.
///
/// Remote paths are `/`-separated and relative to the storage root.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    async fn exists(&self, remote_path: &str) -> Result<bool, UploadError>;

    /// Creates a single directory whose parent already exists.
    async fn mkdir(&self, remote_path: &str) -> Result<(), UploadError>;

    /// Uploads a local file. With `overwrite == false` an existing remote
    /// object is a `Conflict`.
    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), UploadError>;

    /// Renames an object within its directory.
    async fn rename(&self, remote_path: &str, new_name: &str) -> Result<(), UploadError>;
}
