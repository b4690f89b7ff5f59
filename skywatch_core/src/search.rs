//! Contact search and the watch list.
//!
//! Both views are pure functions of the current entity table, track store
//! and metadata: nothing is cached, so recomputing them after every update
//! is always safe. Results keep the entity table's insertion order.

use crate::entity::{Category, Entity, EntityTable};
use crate::metadata::MetadataSource;
use crate::tracks::TrackStore;

/// Configuration for the SearchMatcher
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Non-sea contacts slower than this are dropped from search results
    /// (default: 25 knots, suppresses parked aircraft)
    pub min_relevant_speed_knots: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_relevant_speed_knots: 25.0,
        }
    }
}

/// A parsed search box query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `@tag`: exact, case-insensitive tag membership
    Tag(String),

    /// Free text: substring of the name (air/sea only) or of the pilot
    Text(String),

    /// Nothing to search for (`""` or a bare `@`)
    Empty,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        if let Some(tag) = raw.strip_prefix('@') {
            let tag = tag.to_lowercase();
            if tag.is_empty() {
                Query::Empty
            } else {
                Query::Tag(tag)
            }
        } else if raw.is_empty() {
            Query::Empty
        } else {
            Query::Text(raw.to_lowercase())
        }
    }

    /// Whether `entity` matches, before the relevance filter.
    pub fn matches<M: MetadataSource + ?Sized>(&self, entity: &Entity, metadata: &M) -> bool {
        match self {
            Query::Empty => false,
            Query::Tag(tag) => metadata
                .metadata_of(entity.id)
                .map(|meta| meta.has_tag(tag))
                .unwrap_or(false),
            Query::Text(text) => {
                let by_name = (entity.has_category(&Category::Air)
                    || entity.has_category(&Category::Sea))
                    && entity.name.to_lowercase().contains(text.as_str());
                let by_pilot = entity
                    .pilot
                    .as_ref()
                    .map(|pilot| pilot.to_lowercase().contains(text.as_str()))
                    .unwrap_or(false);
                by_name || by_pilot
            }
        }
    }
}

/// Applies queries and the tactical relevance filter over the picture.
#[derive(Debug, Clone, Default)]
pub struct SearchMatcher {
    config: SearchConfig,
}

impl SearchMatcher {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Sea contacts always pass; everything else must be moving at least
    /// `min_relevant_speed_knots`.
    pub fn is_relevant(&self, entity: &Entity, tracks: &TrackStore) -> bool {
        entity.has_category(&Category::Sea)
            || tracks.speed_of(entity.id) >= self.config.min_relevant_speed_knots
    }

    /// Entities matching `query`, in table order. Entities without a trail
    /// are left out, whatever their category.
    pub fn search<'a, M: MetadataSource + ?Sized>(
        &self,
        query: &Query,
        entities: &'a EntityTable,
        tracks: &TrackStore,
        metadata: &M,
    ) -> Vec<&'a Entity> {
        if *query == Query::Empty {
            return Vec::new();
        }

        entities
            .iter()
            .filter(|entity| query.matches(*entity, metadata))
            .filter(|entity| tracks.tracks_of(entity.id).is_some())
            .filter(|entity| self.is_relevant(entity, tracks))
            .collect()
    }

    /// Watched entities that still have both an entity record and a trail.
    pub fn watch_list<'a>(&self, entities: &'a EntityTable, tracks: &TrackStore) -> Vec<&'a Entity> {
        entities
            .iter()
            .filter(|entity| tracks.is_watching(entity.id))
            .filter(|entity| tracks.tracks_of(entity.id).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::metadata::{EntityMetadata, EntityMetadataStore};
    use crate::tracks::TrackPing;

    fn entity(id: u32, name: &str, categories: Vec<Category>, pilot: Option<&str>) -> Entity {
        Entity {
            id: EntityId(id),
            categories,
            name: name.to_string(),
            pilot: pilot.map(str::to_string),
            group: format!("Group-{id}"),
            coalition: "Allies".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Two pings one minute apart covering `knots / 60` nautical miles.
    fn give_speed(tracks: &mut TrackStore, id: u32, knots: f64) {
        let nm = knots / 60.0;
        let deg = (nm / 0.539957 / 6371.0).to_degrees();
        tracks.ingest(EntityId(id), TrackPing::new(0.0, 0.0, 0.0)).unwrap();
        tracks.ingest(EntityId(id), TrackPing::new(60.0, deg, 0.0)).unwrap();
    }

    struct Fixture {
        entities: EntityTable,
        tracks: TrackStore,
        metadata: EntityMetadataStore,
    }

    fn fixture() -> Fixture {
        let mut entities = EntityTable::new();
        entities.upsert(entity(1, "CVN_71", vec![Category::Sea], None));
        entities.upsert(entity(2, "F/A-18C_hornet", vec![Category::Air], Some("Jester")));
        entities.upsert(entity(3, "F/A-18C_hornet", vec![Category::Air], Some("Iceman")));
        entities.upsert(entity(4, "F-16C_50", vec![Category::Air], None));
        entities.upsert(entity(5, "Hornet Ground Crew", vec![Category::Ground], None));

        let mut tracks = TrackStore::with_defaults();
        tracks.ingest(EntityId(1), TrackPing::new(0.0, 0.0, 0.0)).unwrap();
        give_speed(&mut tracks, 2, 30.0);
        give_speed(&mut tracks, 3, 10.0);
        give_speed(&mut tracks, 4, 450.0);
        give_speed(&mut tracks, 5, 40.0);

        let mut metadata = EntityMetadataStore::new();
        metadata.insert(EntityId(4), EntityMetadata::new(["redfor", "sam"]));
        metadata.insert(EntityId(1), EntityMetadata::new(["boat"]));

        Fixture {
            entities,
            tracks,
            metadata,
        }
    }

    fn ids(found: &[&Entity]) -> Vec<u32> {
        found.iter().map(|e| e.id.0).collect()
    }

    fn run(f: &Fixture, raw: &str) -> Vec<u32> {
        let matcher = SearchMatcher::default();
        ids(&matcher.search(&Query::parse(raw), &f.entities, &f.tracks, &f.metadata))
    }

    #[test]
    fn test_query_parse() {
        assert_eq!(Query::parse("@REDFOR"), Query::Tag("redfor".to_string()));
        assert_eq!(Query::parse("@"), Query::Empty);
        assert_eq!(Query::parse(""), Query::Empty);
        assert_eq!(Query::parse("Hornet"), Query::Text("hornet".to_string()));
    }

    #[test]
    fn test_tag_query_is_exact_and_case_insensitive() {
        let f = fixture();
        assert_eq!(run(&f, "@redfor"), vec![4]);
        assert_eq!(run(&f, "@REDFOR"), vec![4]);
        assert!(run(&f, "@blue").is_empty());
        assert!(run(&f, "@red").is_empty());
    }

    #[test]
    fn test_empty_tag_yields_nothing() {
        let f = fixture();
        assert!(run(&f, "@").is_empty());
        assert!(run(&f, "").is_empty());
    }

    #[test]
    fn test_text_query_matches_name_and_pilot() {
        let f = fixture();
        // id 3 matches by name but is too slow, id 5 is ground-only by name
        assert_eq!(run(&f, "hornet"), vec![2]);
        assert_eq!(run(&f, "JESTER"), vec![2]);
        assert_eq!(run(&f, "cvn"), vec![1]);
    }

    #[test]
    fn test_relevance_filter() {
        let f = fixture();
        let matcher = SearchMatcher::default();
        let sea = f.entities.get(EntityId(1)).unwrap();
        let slow_air = f.entities.get(EntityId(3)).unwrap();
        let fast_air = f.entities.get(EntityId(2)).unwrap();

        assert!(matcher.is_relevant(sea, &f.tracks));
        assert!(!matcher.is_relevant(slow_air, &f.tracks));
        assert!(matcher.is_relevant(fast_air, &f.tracks));
    }

    #[test]
    fn test_sea_contact_without_track_is_skipped() {
        let mut f = fixture();
        f.entities.upsert(entity(9, "LHA_Tarawa", vec![Category::Sea], None));
        assert!(run(&f, "tarawa").is_empty());

        f.tracks.ingest(EntityId(9), TrackPing::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(run(&f, "tarawa"), vec![9]);
    }

    #[test]
    fn test_results_keep_table_order() {
        let f = fixture();
        let matcher = SearchMatcher::new(SearchConfig {
            min_relevant_speed_knots: 0.0,
        });
        let found = matcher.search(&Query::parse("f"), &f.entities, &f.tracks, &f.metadata);
        assert_eq!(ids(&found), vec![2, 3, 4]);
    }

    #[test]
    fn test_watch_list_requires_entity_and_track() {
        let mut f = fixture();
        let matcher = SearchMatcher::default();
        f.tracks.set_watching(EntityId(4), true);
        f.tracks.set_watching(EntityId(2), true);
        f.tracks.set_watching(EntityId(42), true); // no entity record
        f.entities.upsert(entity(6, "Su-27", vec![Category::Air], None));
        f.tracks.set_watching(EntityId(6), true); // no trail yet

        assert_eq!(ids(&matcher.watch_list(&f.entities, &f.tracks)), vec![2, 4]);

        f.tracks.set_watching(EntityId(2), false);
        assert_eq!(ids(&matcher.watch_list(&f.entities, &f.tracks)), vec![4]);
    }
}
