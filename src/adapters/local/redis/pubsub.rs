//! Redis NotificationChannel implementation.

use super::pool::RedisPool;
use crate::domain::jobs::Notification;
use crate::error::StoreError;
use crate::ports::notify::NotificationChannel;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use futures::stream::{BoxStream, StreamExt};
use std::path::{Path, PathBuf};

#[async_trait]
impl NotificationChannel for RedisPool {
    async fn publish(&self, path: &Path) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let receivers: i64 = conn
            .publish(&self.channel, path.to_string_lossy().as_ref())
            .await?;
        tracing::debug!(path = %path.display(), receivers, "published segment");
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Notification>, StoreError> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(&self.channel).await?;
        tracing::info!(channel = %self.channel, "subscribed to notifications");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(path) => Some(Notification {
                    path: PathBuf::from(path),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping undecodable notification");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}
