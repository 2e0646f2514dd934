use crate::error::UploadError;
use crate::ports::storage::RemoteStorage;
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

/// S3Storage implements RemoteStorage over one S3 bucket.
///
/// S3 has no directories, so `mkdir` succeeds without a request and
/// `rename` is a copy followed by a delete.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Builds a client from the default AWS environment.
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket)
    }
}

fn renamed_key(key: &str, new_name: &str) -> String {
    match key.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, new_name),
        None => new_name.to_string(),
    }
}

fn classify<E>(err: SdkError<E, HttpResponse>) -> UploadError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            UploadError::Transient(message)
        }
        SdkError::ServiceError(ctx) => match ctx.err().code() {
            Some("AccessDenied") => UploadError::Permission(message),
            Some("SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout") => {
                UploadError::Transient(message)
            }
            _ => UploadError::Fatal(message),
        },
        _ => UploadError::Fatal(message),
    }
}

#[async_trait]
impl RemoteStorage for S3Storage {
    async fn exists(&self, remote_path: &str) -> Result<bool, UploadError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(remote_path)
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found() => Ok(false),
            Err(e) => Err(classify(e)),
        }
    }

    async fn mkdir(&self, _remote_path: &str) -> Result<(), UploadError> {
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        if !overwrite && self.exists(remote_path).await? {
            return Err(UploadError::Conflict(remote_path.to_string()));
        }
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| UploadError::Fatal(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(remote_path)
            .body(body)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn rename(&self, remote_path: &str, new_name: &str) -> Result<(), UploadError> {
        let target = renamed_key(remote_path, new_name);
        if self.exists(&target).await? {
            return Err(UploadError::Conflict(target));
        }

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, remote_path))
            .key(&target)
            .send()
            .await
            .map_err(classify)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(remote_path)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_stay_in_the_same_prefix() {
        assert_eq!(renamed_key("archive/cam1/a.tmp", "a.mkv"), "archive/cam1/a.mkv");
        assert_eq!(renamed_key("a.tmp", "a.mkv"), "a.mkv");
    }
}
