//! Common types exchanged across the environment boundary.

use serde::{Deserialize, Serialize};

/// One decoded entity update, as delivered by the ingestion layer.
///
/// Mirrors what the server reports for a contact; the kernel converts it
/// into its own `Entity` and `TrackPing` types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Server-assigned object identifier
    pub id: u32,

    /// Coalition label (e.g. "Allies", "Enemies")
    pub coalition: String,

    /// Category tags such as "Air", "Sea", "Ground"
    pub types: Vec<String>,

    /// Display name / type code (e.g. "F/A-18C")
    pub name: String,

    /// Pilot callsign, if a player or named AI is flying it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pilot: Option<String>,

    /// Group name
    #[serde(default)]
    pub group: String,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Sample time in seconds (server clock)
    pub timestamp: f64,
}

/// An event on the entity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedEvent {
    /// A new or updated entity position
    Snapshot(EntitySnapshot),

    /// The server confirmed the entity is gone
    Removed(u32),
}

impl FeedEvent {
    /// Returns the entity id this event refers to.
    pub fn entity_id(&self) -> u32 {
        match self {
            FeedEvent::Snapshot(snapshot) => snapshot.id,
            FeedEvent::Removed(id) => *id,
        }
    }
}
