//! Error types for the Skywatch environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The receiving side of a feed has been dropped.
    #[error("Feed closed")]
    FeedClosed,

    /// The feed buffer is full; the event was not queued.
    #[error("Feed full")]
    FeedFull,
}
