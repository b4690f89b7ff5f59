//! Overlay Runtime - Drives the tactical picture from an entity feed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      OverlayRuntime                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: SkywatchContext                │   │
//! │  │  • now() → event timing for logs                     │   │
//! │  │  • seed() → reported at startup                      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                              │
//! │  ┌────────────┐      ┌──────────────────────────────────┐   │
//! │  │ EntityFeed │ ───► │         TacticalPicture          │   │
//! │  └────────────┘      └──────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use skywatch_core::runtime::OverlayRuntime;
//! use skywatch_core::picture::TacticalPicture;
//! use skywatch_env::{ChannelFeed, TokioContext};
//!
//! let (sender, feed) = ChannelFeed::new(256);
//! let mut runtime = OverlayRuntime::new(TokioContext::shared(), Arc::new(feed), TacticalPicture::with_defaults());
//! let stats = runtime.run().await;
//! ```

use std::sync::Arc;

use skywatch_env::{EntityFeed, FeedEvent, SkywatchContext};
use tracing::{debug, info};

use crate::picture::{ApplyOutcome, TacticalPicture};

/// Counters accumulated while pumping the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub applied: u64,
    pub rejected: u64,
    pub purged: u64,
}

impl RuntimeStats {
    pub fn total(&self) -> u64 {
        self.applied + self.rejected + self.purged
    }
}

/// Generic over the context and feed, so the same loop runs against a
/// live server or the simulator.
pub struct OverlayRuntime<Ctx, Feed>
where
    Ctx: SkywatchContext,
    Feed: EntityFeed,
{
    pub context: Arc<Ctx>,
    pub feed: Arc<Feed>,
    picture: TacticalPicture,
    stats: RuntimeStats,
}

impl<Ctx, Feed> OverlayRuntime<Ctx, Feed>
where
    Ctx: SkywatchContext,
    Feed: EntityFeed,
{
    pub fn new(context: Arc<Ctx>, feed: Arc<Feed>, picture: TacticalPicture) -> Self {
        Self {
            context,
            feed,
            picture,
            stats: RuntimeStats::default(),
        }
    }

    pub fn picture(&self) -> &TacticalPicture {
        &self.picture
    }

    pub fn picture_mut(&mut self) -> &mut TacticalPicture {
        &mut self.picture
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    /// Applies one event and updates the counters.
    pub fn handle(&mut self, event: &FeedEvent) -> ApplyOutcome {
        let outcome = self.picture.apply_event(event);
        match &outcome {
            ApplyOutcome::Applied => self.stats.applied += 1,
            ApplyOutcome::Rejected(_) => self.stats.rejected += 1,
            ApplyOutcome::Purged(_) => self.stats.purged += 1,
        }
        outcome
    }

    /// Waits for the next event and applies it. Returns `false` once the
    /// feed has closed.
    pub async fn step(&mut self) -> bool {
        match self.feed.recv().await {
            Some(event) => {
                let outcome = self.handle(&event);
                debug!(
                    "t={:.3}s entity {} -> {:?}",
                    self.context.now().as_secs_f64(),
                    event.entity_id(),
                    outcome
                );
                true
            }
            None => false,
        }
    }

    /// Pumps the feed until it closes.
    pub async fn run(&mut self) -> RuntimeStats {
        info!("Overlay runtime started (seed {})", self.context.seed());
        while self.step().await {}
        info!(
            "Feed closed: {} applied, {} rejected, {} purged",
            self.stats.applied, self.stats.rejected, self.stats.purged
        );
        self.stats
    }
}
