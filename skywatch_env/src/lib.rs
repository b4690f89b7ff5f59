//! Skywatch Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam between the Skywatch kernel and
//! whatever is actually delivering entity updates, so the same overlay code
//! runs against a live server connection (tokio) or a deterministic
//! simulator.
//!
//! # Core Concept
//!
//! The kernel never reads a socket or a wall clock directly. It sees:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Entity updates (`EntityFeed::recv()`)
//!
//! # Example
//!
//! ```ignore
//! use skywatch_env::{ChannelFeed, EntityFeed, FeedEvent};
//!
//! let (sender, feed) = ChannelFeed::new(64);
//! sender.send(FeedEvent::Removed(42)).await?;
//! while let Some(event) = feed.recv().await {
//!     handle(event);
//! }
//! ```

mod context;
mod error;
mod feed;
mod tokio_impl;
mod types;

pub use context::SkywatchContext;
pub use error::EnvError;
pub use feed::EntityFeed;
pub use tokio_impl::{ChannelFeed, FeedSender, TokioContext};
pub use types::{EntitySnapshot, FeedEvent};
