//! Production implementations backed by Tokio.

use crate::error::EnvError;
use crate::types::FeedEvent;
use crate::{EntityFeed, SkywatchContext};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, Mutex};

/// Production context backed by Tokio and the system clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SkywatchContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

/// Sending half of a `ChannelFeed`.
#[derive(Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<FeedEvent>,
}

impl FeedSender {
    /// Queues an event for the overlay.
    ///
    /// # Returns
    /// * `Ok(())` - Event queued
    /// * `Err(EnvError::FeedClosed)` - The feed side was dropped
    pub async fn send(&self, event: FeedEvent) -> Result<(), EnvError> {
        self.tx.send(event).await.map_err(|_| EnvError::FeedClosed)
    }

    /// Non-blocking variant of `send`, for synchronous producers.
    ///
    /// # Returns
    /// * `Err(EnvError::FeedFull)` - The buffer is at capacity
    /// * `Err(EnvError::FeedClosed)` - The feed side was dropped
    pub fn try_send(&self, event: FeedEvent) -> Result<(), EnvError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnvError::FeedFull,
            mpsc::error::TrySendError::Closed(_) => EnvError::FeedClosed,
        })
    }
}

/// Channel-backed entity feed.
///
/// The feed closes once every `FeedSender` has been dropped and the
/// buffered events are drained.
pub struct ChannelFeed {
    rx: Mutex<mpsc::Receiver<FeedEvent>>,
}

impl ChannelFeed {
    /// Creates a bounded feed and its sender.
    pub fn new(capacity: usize) -> (FeedSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (FeedSender { tx }, Self { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl EntityFeed for ChannelFeed {
    async fn recv(&self) -> Option<FeedEvent> {
        self.rx.lock().await.recv().await
    }
}
