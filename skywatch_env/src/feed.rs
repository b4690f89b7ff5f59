//! Entity feed abstraction: the ingestion side of the overlay.

use async_trait::async_trait;
use crate::types::FeedEvent;

/// Source of entity updates delivered by an external ingestion layer.
///
/// # Implementations
///
/// - **Production**: a server connection decoding its own wire format
/// - **Simulation / tests**: `ChannelFeed`, backed by a tokio mpsc channel
///
/// The feed owns no wire format; it hands over already decoded snapshots.
#[async_trait]
pub trait EntityFeed: Send + Sync + 'static {
    /// Receives the next event.
    ///
    /// # Returns
    /// * `Some(event)` - An entity update or removal
    /// * `None` - The feed was closed (server disconnected or shutdown)
    async fn recv(&self) -> Option<FeedEvent>;
}
