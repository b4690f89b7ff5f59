//! Skywatch Core - Tactical overlay kernel
//!
//! This library turns a stream of entity reports into a tactical picture:
//! 1. **Geodesy**: Vincenty projection, rhumb-line bearings, haversine ranges, DMS/DDM text
//! 2. **Tracks**: Bounded per-entity trails with speed estimation
//! 3. **Search**: Tag and text queries with a tactical relevance filter, plus the watch list
//! 4. **Naming**: Stable track numbers and coalition-aware contact labels

pub mod entity;
pub mod geodesy;
pub mod metadata;
pub mod naming;
pub mod picture;
pub mod runtime;
pub mod search;
pub mod settings;
pub mod store;
pub mod theater;
pub mod tracks;

// Re-export key types for convenience
pub use entity::{Category, Entity, EntityId, EntityTable};
pub use geodesy::{Braa, GeodesyError, LatLon};
pub use metadata::{EntityMetadata, EntityMetadataStore, MetadataSource};
pub use naming::{AircraftRegistry, NameFormatter, TrackIdRegistry};
pub use picture::{ApplyOutcome, ContactRow, PictureConfig, TacticalPicture};
pub use runtime::{OverlayRuntime, RuntimeStats};
pub use search::{Query, SearchConfig, SearchMatcher};
pub use settings::{GroundUnitMode, Settings, SettingsError, SettingsPatch};
pub use store::{Patch, Store, Subscription};
pub use theater::{Theater, TheaterError};
pub use tracks::{Track, TrackPing, TrackStore, TrackStoreConfig, TrackingError};
