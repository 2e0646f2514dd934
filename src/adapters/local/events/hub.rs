use crate::domain::jobs::Notification;
use crate::error::StoreError;
use crate::ports::notify::NotificationChannel;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::Path;
use tokio::sync::broadcast;

/// Broadcast-backed `NotificationChannel` for single-process deployments
/// and tests. Messages published with no subscriber are dropped.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Notification>,
}

impl EventHub {
    pub fn new() -> Self {
        // Capacity of 100 events should be sufficient for now
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for EventHub {
    async fn publish(&self, path: &Path) -> Result<(), StoreError> {
        let delivered = self
            .sender
            .send(Notification {
                path: path.to_path_buf(),
            })
            .unwrap_or(0);
        tracing::debug!(path = %path.display(), delivered, "published segment");
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Notification>, StoreError> {
        let rx = self.sender.subscribe();
        let stream = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(notification) => return Some((notification, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notification subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn subscribers_receive_later_publications_in_order() {
        let hub = EventHub::new();
        hub.publish(Path::new("early.mkv")).await.unwrap();

        let mut sub = hub.subscribe().await.unwrap();
        hub.publish(Path::new("a.mkv")).await.unwrap();
        hub.publish(Path::new("b.mkv")).await.unwrap();

        assert_eq!(sub.next().await.unwrap().path, PathBuf::from("a.mkv"));
        assert_eq!(sub.next().await.unwrap().path, PathBuf::from("b.mkv"));
    }
}
