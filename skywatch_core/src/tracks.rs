//! The "TRACKS" Engine - Per-entity position history and speed estimation
//!
//! Each entity gets a bounded trail of timestamped pings. The trail feeds
//! two things: the map's history dots and the speed-over-ground estimate
//! used by the search relevance filter.
//!
//! Watch flags live beside the tracks but are independent of them: toggling
//! a watch never touches history, and clearing history never drops a watch.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::entity::EntityId;
use crate::geodesy::{great_circle_distance_nm, LatLon};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the TrackStore
#[derive(Debug, Clone)]
pub struct TrackStoreConfig {
    /// Maximum pings kept per entity (default: 9)
    pub trail_length: usize,
}

impl Default for TrackStoreConfig {
    fn default() -> Self {
        Self { trail_length: 9 }
    }
}

// ============================================================================
// TRACK DATA
// ============================================================================

/// One timestamped position sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPing {
    /// Sample time in seconds
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl TrackPing {
    pub fn new(timestamp: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
        }
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Time-ordered trail of pings for one entity, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pings: VecDeque<TrackPing>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent ping, if any.
    pub fn newest(&self) -> Option<&TrackPing> {
        self.pings.back()
    }

    pub fn pings(&self) -> impl Iterator<Item = &TrackPing> {
        self.pings.iter()
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    fn truncate_to(&mut self, trail_length: usize) {
        while self.pings.len() > trail_length {
            self.pings.pop_front();
        }
    }
}

/// Per-entity display options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackOptions {
    pub watching: bool,
}

/// Speed over ground in knots from the two most recent pings.
///
/// Returns 0 for a track with fewer than two pings or with no elapsed time
/// between them: a new contact or a duplicate report is not an error.
pub fn estimated_speed_knots(track: &Track) -> f64 {
    let len = track.pings.len();
    if len < 2 {
        return 0.0;
    }

    let previous = &track.pings[len - 2];
    let latest = &track.pings[len - 1];
    let elapsed_secs = latest.timestamp - previous.timestamp;
    if elapsed_secs <= 0.0 {
        return 0.0;
    }

    let distance_nm = great_circle_distance_nm(previous.position(), latest.position());
    distance_nm / (elapsed_secs / 3600.0)
}

// ============================================================================
// TRACK STORE
// ============================================================================

/// Owner of every track and watch flag, keyed by entity.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: HashMap<EntityId, Track>,
    options: HashMap<EntityId, TrackOptions>,
    config: TrackStoreConfig,
}

impl TrackStore {
    pub fn new(config: TrackStoreConfig) -> Self {
        Self {
            tracks: HashMap::new(),
            options: HashMap::new(),
            config: TrackStoreConfig {
                trail_length: config.trail_length.max(1),
            },
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(TrackStoreConfig::default())
    }

    pub fn trail_length(&self) -> usize {
        self.config.trail_length
    }

    /// Changes the trail length, trimming existing trails from the oldest end.
    pub fn set_trail_length(&mut self, trail_length: usize) {
        self.config.trail_length = trail_length.max(1);
        for track in self.tracks.values_mut() {
            track.truncate_to(self.config.trail_length);
        }
    }

    /// Appends a ping to an entity's trail, creating the trail on first use.
    ///
    /// Pings older than the trail's newest sample are rejected and leave
    /// the trail untouched. Equal timestamps are accepted (duplicate reports
    /// read as zero speed).
    pub fn ingest(&mut self, entity_id: EntityId, ping: TrackPing) -> Result<(), TrackingError> {
        if !(ping.timestamp.is_finite() && ping.latitude.is_finite() && ping.longitude.is_finite()) {
            return Err(TrackingError::InvalidPing(entity_id));
        }

        let trail_length = self.config.trail_length;
        let track = self.tracks.entry(entity_id).or_default();

        if let Some(newest) = track.newest() {
            if ping.timestamp < newest.timestamp {
                debug!(
                    "Rejecting out-of-order ping for {}: {} < {}",
                    entity_id, ping.timestamp, newest.timestamp
                );
                return Err(TrackingError::OutOfOrder {
                    entity_id,
                    newest: newest.timestamp,
                    rejected: ping.timestamp,
                });
            }
        }

        track.pings.push_back(ping);
        track.truncate_to(trail_length);
        Ok(())
    }

    pub fn tracks_of(&self, entity_id: EntityId) -> Option<&Track> {
        self.tracks.get(&entity_id)
    }

    /// Speed estimate for an entity, 0 when it has no usable trail.
    pub fn speed_of(&self, entity_id: EntityId) -> f64 {
        self.tracks_of(entity_id)
            .map(estimated_speed_knots)
            .unwrap_or(0.0)
    }

    pub fn set_watching(&mut self, entity_id: EntityId, watching: bool) {
        self.options.entry(entity_id).or_default().watching = watching;
    }

    pub fn is_watching(&self, entity_id: EntityId) -> bool {
        self.options
            .get(&entity_id)
            .map(|options| options.watching)
            .unwrap_or(false)
    }

    pub fn options_of(&self, entity_id: EntityId) -> Option<&TrackOptions> {
        self.options.get(&entity_id)
    }

    /// Drops every watch flag; trails are kept.
    pub fn clear_watches(&mut self) {
        self.options.clear();
    }

    /// Removes the trail and the options of an entity confirmed gone.
    pub fn purge(&mut self, entity_id: EntityId) -> bool {
        let had_track = self.tracks.remove(&entity_id).is_some();
        let had_options = self.options.remove(&entity_id).is_some();
        if had_track || had_options {
            debug!("Purged track state for {}", entity_id);
        }
        had_track || had_options
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors that can occur during track ingestion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackingError {
    #[error("Out-of-order ping for entity {entity_id}: {rejected} is older than {newest}")]
    OutOfOrder {
        entity_id: EntityId,
        newest: f64,
        rejected: f64,
    },

    #[error("Ping for entity {0} has non-finite fields")]
    InvalidPing(EntityId),
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::KM_TO_NM;
    use approx::assert_relative_eq;

    const ID: EntityId = EntityId(1);

    /// Latitude delta (degrees) that is exactly one nautical mile on the
    /// haversine sphere.
    fn one_nm_in_degrees() -> f64 {
        let km = 1.0 / KM_TO_NM;
        (km / 6371.0).to_degrees()
    }

    #[test]
    fn test_speed_one_nm_per_hour_is_one_knot() {
        let mut store = TrackStore::with_defaults();
        store.ingest(ID, TrackPing::new(0.0, 42.0, 41.0)).unwrap();
        store
            .ingest(ID, TrackPing::new(3600.0, 42.0 + one_nm_in_degrees(), 41.0))
            .unwrap();

        let speed = estimated_speed_knots(store.tracks_of(ID).unwrap());
        assert_relative_eq!(speed, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_ping_has_zero_speed() {
        let mut store = TrackStore::with_defaults();
        store.ingest(ID, TrackPing::new(5.0, 42.0, 41.0)).unwrap();
        assert_eq!(estimated_speed_knots(store.tracks_of(ID).unwrap()), 0.0);
        assert_eq!(estimated_speed_knots(&Track::new()), 0.0);
        assert_eq!(store.speed_of(EntityId(99)), 0.0);
    }

    #[test]
    fn test_duplicate_timestamp_reads_as_zero_speed() {
        let mut store = TrackStore::with_defaults();
        store.ingest(ID, TrackPing::new(5.0, 42.0, 41.0)).unwrap();
        store.ingest(ID, TrackPing::new(5.0, 42.1, 41.0)).unwrap();
        assert_eq!(store.speed_of(ID), 0.0);
        assert_eq!(store.tracks_of(ID).unwrap().len(), 2);
    }

    #[test]
    fn test_speed_uses_two_most_recent_pings() {
        let mut store = TrackStore::with_defaults();
        let step = one_nm_in_degrees();
        // 1 nm in an hour, then 1 nm in 6 minutes
        store.ingest(ID, TrackPing::new(0.0, 0.0, 0.0)).unwrap();
        store.ingest(ID, TrackPing::new(3600.0, step, 0.0)).unwrap();
        store.ingest(ID, TrackPing::new(3960.0, 2.0 * step, 0.0)).unwrap();
        assert_relative_eq!(store.speed_of(ID), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_out_of_order_ping_is_rejected() {
        let mut store = TrackStore::with_defaults();
        store.ingest(ID, TrackPing::new(10.0, 42.0, 41.0)).unwrap();

        let result = store.ingest(ID, TrackPing::new(9.0, 43.0, 41.0));
        assert_eq!(
            result,
            Err(TrackingError::OutOfOrder {
                entity_id: ID,
                newest: 10.0,
                rejected: 9.0
            })
        );

        let track = store.tracks_of(ID).unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.newest().unwrap().latitude, 42.0);
    }

    #[test]
    fn test_non_finite_ping_is_rejected() {
        let mut store = TrackStore::with_defaults();
        let result = store.ingest(ID, TrackPing::new(f64::NAN, 42.0, 41.0));
        assert_eq!(result, Err(TrackingError::InvalidPing(ID)));
        assert!(store.tracks_of(ID).is_none());
    }

    #[test]
    fn test_trail_evicts_oldest() {
        let mut store = TrackStore::new(TrackStoreConfig { trail_length: 3 });
        for t in 0..5 {
            store.ingest(ID, TrackPing::new(t as f64, 0.0, t as f64 * 0.01)).unwrap();
        }

        let timestamps: Vec<f64> = store.tracks_of(ID).unwrap().pings().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_shrinking_trail_length_trims_existing_tracks() {
        let mut store = TrackStore::new(TrackStoreConfig { trail_length: 5 });
        for t in 0..5 {
            store.ingest(ID, TrackPing::new(t as f64, 0.0, 0.0)).unwrap();
        }
        store.set_trail_length(2);

        let timestamps: Vec<f64> = store.tracks_of(ID).unwrap().pings().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![3.0, 4.0]);
        assert_eq!(store.trail_length(), 2);
    }

    #[test]
    fn test_zero_trail_length_is_clamped() {
        let store = TrackStore::new(TrackStoreConfig { trail_length: 0 });
        assert_eq!(store.trail_length(), 1);
    }

    #[test]
    fn test_watch_flag_is_independent_of_history() {
        let mut store = TrackStore::with_defaults();
        assert!(!store.is_watching(ID));

        store.set_watching(ID, true);
        assert!(store.is_watching(ID));
        assert!(store.tracks_of(ID).is_none());

        store.ingest(ID, TrackPing::new(0.0, 1.0, 1.0)).unwrap();
        store.set_watching(ID, false);
        assert!(!store.is_watching(ID));
        assert_eq!(store.tracks_of(ID).unwrap().len(), 1);
        assert_eq!(store.options_of(ID), Some(&TrackOptions { watching: false }));
    }

    #[test]
    fn test_purge_removes_track_and_options() {
        let mut store = TrackStore::with_defaults();
        store.ingest(ID, TrackPing::new(0.0, 1.0, 1.0)).unwrap();
        store.set_watching(ID, true);

        assert!(store.purge(ID));
        assert!(store.tracks_of(ID).is_none());
        assert!(!store.is_watching(ID));
        assert!(!store.purge(ID));
    }

    #[test]
    fn test_clear_watches_keeps_tracks() {
        let mut store = TrackStore::with_defaults();
        store.ingest(ID, TrackPing::new(0.0, 1.0, 1.0)).unwrap();
        store.set_watching(ID, true);
        store.clear_watches();

        assert!(!store.is_watching(ID));
        assert_eq!(store.track_count(), 1);
    }
}
