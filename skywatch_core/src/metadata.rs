//! Entity metadata: operator/mission supplied tags used by `@tag` queries.
//!
//! The metadata source is external; the kernel only reads it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::EntityId;

/// Tag set attached to one entity. Tags are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub tags: Vec<String>,
}

impl EntityMetadata {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            if !tag.is_empty() && !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        Self { tags: normalized }
    }

    /// Exact membership; `tag` must already be lower-cased.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Read-only view of per-entity metadata.
pub trait MetadataSource {
    fn metadata_of(&self, entity_id: EntityId) -> Option<&EntityMetadata>;
}

/// In-memory metadata store, filled by whatever loads mission data.
#[derive(Debug, Clone, Default)]
pub struct EntityMetadataStore {
    entities: HashMap<EntityId, EntityMetadata>,
}

impl EntityMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity_id: EntityId, metadata: EntityMetadata) {
        self.entities.insert(entity_id, metadata);
    }

    pub fn remove(&mut self, entity_id: EntityId) -> Option<EntityMetadata> {
        self.entities.remove(&entity_id)
    }

    /// Loads a `{ "<id>": { "tags": [...] } }` JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<u32, EntityMetadata> = serde_json::from_str(json)?;
        let entities = raw
            .into_iter()
            .map(|(id, meta)| (EntityId(id), EntityMetadata::new(meta.tags)))
            .collect();
        Ok(Self { entities })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MetadataSource for EntityMetadataStore {
    fn metadata_of(&self, entity_id: EntityId) -> Option<&EntityMetadata> {
        self.entities.get(&entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_normalized() {
        let meta = EntityMetadata::new(["RedFor", " sam ", "redfor", ""]);
        assert_eq!(meta.tags, vec!["redfor".to_string(), "sam".to_string()]);
        assert!(meta.has_tag("sam"));
        assert!(!meta.has_tag("sa"));
    }

    #[test]
    fn test_from_json() {
        let store = EntityMetadataStore::from_json(r#"{"12": {"tags": ["SAM", "redfor"]}}"#).unwrap();
        let meta = store.metadata_of(EntityId(12)).unwrap();
        assert!(meta.has_tag("sam"));
        assert!(meta.has_tag("redfor"));
        assert!(store.metadata_of(EntityId(13)).is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(EntityMetadataStore::from_json("[1, 2]").is_err());
    }
}
