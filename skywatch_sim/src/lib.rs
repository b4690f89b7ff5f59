//! Skywatch Deterministic Scenario Simulator
//!
//! This crate provides a controlled airspace where the overlay kernel runs
//! deterministically against known ground truth.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when the runner steps it
//! - **Feed**: Delivery order and delays are scripted per scenario
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock)                           │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼─────────────┐   ChannelFeed   ┌──────────────────┐  │
//! │  │      Oracle      │ ──────────────► │  OverlayRuntime  │  │
//! │  │  (Ground Truth)  │                 │ TacticalPicture  │  │
//! │  └──────────────────┘                 └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use skywatch_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42).with_duration(60.0);
//! let result = runner.run(ScenarioId::FogOfWar).await;
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod oracle;
pub mod persist;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{capture_frame, ContactFrame, ContactPosition, SimEvent, SimExport, SimFrame};
pub use oracle::{ContactProfile, GroundTruthContact, Oracle};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
