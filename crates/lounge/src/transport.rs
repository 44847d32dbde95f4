//! Transport abstraction consumed by session engines.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::error::Result;
use crate::event::RawEvent;

/// Channel capacity between a poller task and its subscription.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Live stream of inbound events for one screen.
///
/// The stream ends when the remote side disconnects, the network fails, or
/// the subscription is dropped. Dropping aborts the background poller.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<RawEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver fed by a background task.
    pub fn new(rx: mpsc::Receiver<RawEvent>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Wrap a receiver whose sender is owned elsewhere.
    pub fn from_channel(rx: mpsc::Receiver<RawEvent>) -> Self {
        Self { rx, task: None }
    }

    /// Receive the next event. Returns `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<RawEvent> {
        self.rx.recv().await
    }

    /// Close the stream and stop the background poller.
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Remote session transport for lounge screens.
#[async_trait]
pub trait LoungeTransport: Send + Sync {
    /// Open a subscription to the screen's event stream.
    async fn subscribe(&self, screen_id: &str) -> Result<Subscription>;

    /// Send a single command to the screen.
    async fn send_command(&self, screen_id: &str, command: &Command) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn test_subscription_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::from_channel(rx);

        tx.send(RawEvent::new("noop", Value::Null)).await.unwrap();
        drop(tx);

        assert_eq!(sub.next().await.map(|e| e.name), Some("noop".to_string()));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_aborts_poller() {
        let (_tx, rx) = mpsc::channel::<RawEvent>(4);
        let (guard_tx, guard_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _guard = guard_tx;
            std::future::pending::<()>().await
        });

        drop(Subscription::new(rx, task));

        assert!(guard_rx.await.is_err());
    }
}
