//! Entity model and the insertion-ordered entity table.
//!
//! Entities are owned by the ingestion layer; the kernel keeps the latest
//! snapshot of each one and never mutates them on its own.

use serde::{Deserialize, Serialize};
use skywatch_env::EntitySnapshot;
use std::collections::HashMap;

use crate::geodesy::LatLon;
use crate::settings::GroundUnitMode;

/// Server-assigned entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Entity category. An entity may carry several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Air,
    Sea,
    Ground,
    Other(String),
}

impl Category {
    /// Parses a server category tag ("Air", "Sea", "Ground", ...).
    pub fn parse(tag: &str) -> Self {
        match tag {
            "Air" => Category::Air,
            "Sea" => Category::Sea,
            "Ground" => Category::Ground,
            other => Category::Other(other.to_string()),
        }
    }
}

/// A tracked contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,

    /// Category set (non-exclusive)
    pub categories: Vec<Category>,

    /// Display name / type code (e.g. "F/A-18C")
    pub name: String,

    /// Pilot callsign, if any
    pub pilot: Option<String>,

    /// Group name
    pub group: String,

    /// Coalition label
    pub coalition: String,

    pub latitude: f64,
    pub longitude: f64,
}

impl Entity {
    pub fn has_category(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }

    /// Ground units are shown either only for our side or only for theirs;
    /// everything else is always on the map.
    pub fn is_visible(&self, mode: GroundUnitMode, user_coalition: &str) -> bool {
        if !self.has_category(&Category::Ground) {
            return true;
        }
        let own = self.coalition == user_coalition;
        match mode {
            GroundUnitMode::Friendly => own,
            GroundUnitMode::Enemy => !own,
        }
    }
}

impl From<&EntitySnapshot> for Entity {
    fn from(snapshot: &EntitySnapshot) -> Self {
        Self {
            id: EntityId(snapshot.id),
            categories: snapshot.types.iter().map(|t| Category::parse(t)).collect(),
            name: snapshot.name.clone(),
            pilot: snapshot.pilot.clone(),
            group: snapshot.group.clone(),
            coalition: snapshot.coalition.clone(),
            latitude: snapshot.latitude,
            longitude: snapshot.longitude,
        }
    }
}

/// Entity collection that iterates in first-insertion order.
///
/// Search and watch results inherit this order, so it is part of the
/// public contract.
#[derive(Debug, Default, Clone)]
pub struct EntityTable {
    order: Vec<EntityId>,
    entities: HashMap<EntityId, Entity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity. A replaced entity keeps its position
    /// in the iteration order.
    pub fn upsert(&mut self, entity: Entity) {
        let id = entity.id;
        if self.entities.insert(id, entity).is_none() {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(removed)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// All entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u32, name: &str, categories: Vec<Category>) -> Entity {
        Entity {
            id: EntityId(id),
            categories,
            name: name.to_string(),
            pilot: None,
            group: String::new(),
            coalition: "Allies".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    #[test]
    fn test_table_preserves_insertion_order_on_update() {
        let mut table = EntityTable::new();
        table.upsert(entity(3, "a", vec![Category::Air]));
        table.upsert(entity(1, "b", vec![Category::Air]));
        table.upsert(entity(2, "c", vec![Category::Sea]));
        table.upsert(entity(3, "a2", vec![Category::Air]));

        let ids: Vec<u32> = table.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(table.get(EntityId(3)).unwrap().name, "a2");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_table_remove() {
        let mut table = EntityTable::new();
        table.upsert(entity(1, "a", vec![]));
        table.upsert(entity(2, "b", vec![]));

        assert!(table.remove(EntityId(1)).is_some());
        assert!(table.remove(EntityId(1)).is_none());
        let ids: Vec<u32> = table.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_from_snapshot() {
        let snapshot = EntitySnapshot {
            id: 7,
            coalition: "Enemies".to_string(),
            types: vec!["Air".to_string(), "Heavy".to_string()],
            name: "Tu-95MS".to_string(),
            pilot: None,
            group: "Bear-1".to_string(),
            latitude: 42.0,
            longitude: 41.5,
            timestamp: 10.0,
        };
        let e = Entity::from(&snapshot);
        assert_eq!(e.id, EntityId(7));
        assert!(e.has_category(&Category::Air));
        assert!(e.has_category(&Category::Other("Heavy".to_string())));
        assert_eq!(e.position(), LatLon::new(42.0, 41.5));
    }

    #[test]
    fn test_ground_unit_visibility() {
        let mut sam = entity(1, "SA-11", vec![Category::Ground]);
        sam.coalition = "Enemies".to_string();
        let jet = entity(2, "F-16C_50", vec![Category::Air]);

        assert!(!sam.is_visible(GroundUnitMode::Friendly, "Allies"));
        assert!(sam.is_visible(GroundUnitMode::Enemy, "Allies"));
        assert!(jet.is_visible(GroundUnitMode::Friendly, "Allies"));
        assert!(jet.is_visible(GroundUnitMode::Enemy, "Allies"));
    }
}
