use crate::domain::jobs::Notification;
use crate::error::StoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// Publish/subscribe channel announcing finished segments.
///
/// Delivery is best-effort and at-most-once; nothing is kept for late
/// subscribers.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn publish(&self, path: &Path) -> Result<(), StoreError>;

    async fn subscribe(&self) -> Result<BoxStream<'static, Notification>, StoreError>;
}

#[async_trait]
impl<T: NotificationChannel + ?Sized> NotificationChannel for std::sync::Arc<T> {
    async fn publish(&self, path: &Path) -> Result<(), StoreError> {
        (**self).publish(path).await
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Notification>, StoreError> {
        (**self).subscribe().await
    }
}
