//! Tactical Picture - The overlay's single source of truth.
//!
//! This module ties the engines together:
//!
//! ```text
//!   EntitySnapshot ──► EntityTable ─┐
//!         │                         ├──► SearchMatcher ──► NameFormatter ──► ContactRow
//!         └────────► TrackStore ────┘          ▲
//!                                 EntityMetadataStore
//! ```
//!
//! Every derived view (`search`, `watch_list`, rows, BRAA) is recomputed
//! from current state on request; nothing derived is cached.

use skywatch_env::{EntitySnapshot, FeedEvent};
use tracing::debug;

use crate::entity::{Entity, EntityId, EntityTable};
use crate::geodesy::{braa, Braa, LatLon};
use crate::metadata::{EntityMetadata, EntityMetadataStore};
use crate::naming::{AircraftRegistry, NameFormatter, TrackIdRegistry};
use crate::search::{Query, SearchConfig, SearchMatcher};
use crate::settings::Settings;
use crate::store::Store;
use crate::theater::Theater;
use crate::tracks::{TrackPing, TrackStore, TrackStoreConfig, TrackingError};

/// Configuration for a TacticalPicture.
#[derive(Debug, Clone, Default)]
pub struct PictureConfig {
    /// Seed for the track id stream
    pub track_id_seed: u64,

    pub search: SearchConfig,
}

/// Result of applying one feed event.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Entity updated and ping appended
    Applied,

    /// Entity updated, ping dropped
    Rejected(TrackingError),

    /// Entity removed (`false` if it was unknown)
    Purged(bool),
}

/// One line of the search or watch console.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRow {
    pub entity_id: EntityId,
    pub label: String,
    pub speed_knots: i64,
}

impl std::fmt::Display for ContactRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} kts", self.label, self.speed_knots)
    }
}

pub struct TacticalPicture {
    entities: EntityTable,
    tracks: TrackStore,
    metadata: EntityMetadataStore,
    track_ids: TrackIdRegistry,
    aircraft: AircraftRegistry,
    matcher: SearchMatcher,
    settings: Store<Settings>,
    theater: Option<Theater>,
}

impl TacticalPicture {
    pub fn new(config: PictureConfig, settings: Store<Settings>) -> Self {
        let trail_length = settings.with(|s| s.map.track_trail_length);
        Self {
            entities: EntityTable::new(),
            tracks: TrackStore::new(TrackStoreConfig { trail_length }),
            metadata: EntityMetadataStore::new(),
            track_ids: TrackIdRegistry::new(config.track_id_seed),
            aircraft: AircraftRegistry::with_defaults(),
            matcher: SearchMatcher::new(config.search),
            settings,
            theater: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PictureConfig::default(), Store::new(Settings::default()))
    }

    pub fn with_aircraft(mut self, aircraft: AircraftRegistry) -> Self {
        self.aircraft = aircraft;
        self
    }

    // ========================================================================
    // INGESTION
    // ========================================================================

    /// Applies a feed event.
    pub fn apply_event(&mut self, event: &FeedEvent) -> ApplyOutcome {
        match event {
            FeedEvent::Snapshot(snapshot) => match self.apply(snapshot) {
                Ok(()) => ApplyOutcome::Applied,
                Err(e) => ApplyOutcome::Rejected(e),
            },
            FeedEvent::Removed(id) => ApplyOutcome::Purged(self.purge(EntityId(*id))),
        }
    }

    /// Appends the snapshot's ping and upserts the entity.
    ///
    /// An out-of-order snapshot still refreshes the non-positional fields,
    /// but the record keeps the position of the newest accepted ping. A
    /// non-finite snapshot leaves the record untouched.
    pub fn apply(&mut self, snapshot: &EntitySnapshot) -> Result<(), TrackingError> {
        self.sync_trail_length();

        let mut entity = Entity::from(snapshot);
        let id = entity.id;
        let ping = TrackPing::new(snapshot.timestamp, snapshot.latitude, snapshot.longitude);
        let result = self.tracks.ingest(id, ping);

        match &result {
            Ok(()) => {}
            Err(e @ TrackingError::InvalidPing(_)) => {
                debug!("Dropped snapshot: {}", e);
                return Err(e.clone());
            }
            Err(e @ TrackingError::OutOfOrder { .. }) => {
                debug!("Dropped ping: {}", e);
                if let Some(current) = self.entities.get(id) {
                    entity.latitude = current.latitude;
                    entity.longitude = current.longitude;
                }
            }
        }

        self.entities.upsert(entity);
        self.track_ids.track_id(id);
        result
    }

    /// Forgets everything known about an entity confirmed gone.
    pub fn purge(&mut self, id: EntityId) -> bool {
        let had_entity = self.entities.remove(id).is_some();
        let had_tracks = self.tracks.purge(id);
        self.metadata.remove(id);
        self.track_ids.forget(id);
        had_entity || had_tracks
    }

    fn sync_trail_length(&mut self) {
        let wanted = self.settings.with(|s| s.map.track_trail_length);
        if wanted != self.tracks.trail_length() {
            self.tracks.set_trail_length(wanted);
        }
    }

    pub fn set_metadata(&mut self, id: EntityId, metadata: EntityMetadata) {
        self.metadata.insert(id, metadata);
    }

    pub fn set_watching(&mut self, id: EntityId, watching: bool) {
        self.tracks.set_watching(id, watching);
    }

    pub fn set_theater(&mut self, theater: Theater) {
        self.theater = Some(theater);
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    pub fn settings(&self) -> &Store<Settings> {
        &self.settings
    }

    pub fn theater(&self) -> Option<Theater> {
        self.theater
    }

    pub fn names(&self) -> NameFormatter<'_> {
        NameFormatter::new(&self.aircraft, &self.track_ids)
    }

    // ========================================================================
    // DERIVED VIEWS
    // ========================================================================

    pub fn search(&self, raw_query: &str) -> Vec<&Entity> {
        self.matcher.search(
            &Query::parse(raw_query),
            &self.entities,
            &self.tracks,
            &self.metadata,
        )
    }

    pub fn watch_list(&self) -> Vec<&Entity> {
        self.matcher.watch_list(&self.entities, &self.tracks)
    }

    /// Entities drawn on the map under the current ground-unit mode.
    pub fn visible_entities(&self) -> Vec<&Entity> {
        let (mode, coalition) = self
            .settings
            .with(|s| (s.map.ground_unit_mode, s.coalition.clone()));
        self.entities
            .iter()
            .filter(|entity| entity.is_visible(mode, &coalition))
            .collect()
    }

    /// Label for an entity under the current coalition and type settings.
    pub fn display_name(&self, entity: &Entity) -> String {
        let (coalition, show_type) = self
            .settings
            .with(|s| (s.coalition.clone(), s.show_aircraft_type_in_track_names));
        self.names().display_track_name(entity, &coalition, show_type)
    }

    pub fn search_rows(&self, raw_query: &str) -> Vec<ContactRow> {
        self.rows(self.search(raw_query))
    }

    pub fn watch_rows(&self) -> Vec<ContactRow> {
        self.rows(self.watch_list())
    }

    fn rows(&self, entities: Vec<&Entity>) -> Vec<ContactRow> {
        entities
            .into_iter()
            .map(|entity| ContactRow {
                entity_id: entity.id,
                label: self.display_name(entity),
                speed_knots: self.tracks.speed_of(entity.id).round() as i64,
            })
            .collect()
    }

    /// Bearing/range from a point to a contact, using the theater's
    /// declination (0 when no theater is set).
    pub fn braa_to(&self, from: LatLon, id: EntityId) -> Option<Braa> {
        let entity = self.entities.get(id)?;
        let declination = self
            .theater
            .map(|theater| theater.magnetic_declination())
            .unwrap_or(0.0);
        Some(braa(from, entity.position(), declination))
    }
}
